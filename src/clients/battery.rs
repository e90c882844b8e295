use super::acpi::AcpiListener;
use super::{MonitorEvent, MonitorSender, emit};
use crate::channels::BroadcastReceiverExt;
use crate::{read_lock, write_lock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

pub const SYS_PATH: &str = "/sys/class/power_supply";

const DEFAULT_AC: &str = "AC0";

/// The aggregate state of every battery, as last computed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryState {
    /// Name of the first battery.
    pub name: String,
    /// Charge level in percent, or `-1` before it is first known.
    pub level: i32,
    pub status: String,
    /// Whether the AC supply is online.
    pub ac_status: bool,
    /// Health: current full charge against design charge, in percent.
    pub capacity: u32,
    /// Time until full or empty, as `HH:MM`.
    pub time: String,
    pub watt: f64,
}

/// Finds `prefix` followed by at least one word character,
/// returning the prefix and every word character after it.
fn match_word(name: &str, prefix: &str) -> Option<String> {
    name.match_indices(prefix).find_map(|(start, _)| {
        let rest = &name[start + prefix.len()..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());

        (len > 0).then(|| name[start..start + prefix.len() + len].to_string())
    })
}

/// Aggregates the batteries found under the power supply class.
///
/// Updates run on every battery or AC adapter ACPI event.
/// Only one update runs at a time;
/// a request made while one is running is dropped.
pub struct BatteryController {
    root: PathBuf,
    ac: String,
    batteries: Vec<String>,
    state: RwLock<BatteryState>,
    running: AtomicBool,
    events: MonitorSender,
}

/// Clears the running flag when an update ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BatteryController {
    pub fn new(root: &Path, events: MonitorSender) -> Self {
        let mut names = fs::read_dir(root)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|entry| entry.file_name().to_str().map(ToString::to_string))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        names.sort();

        let mut batteries = vec![];
        let mut ac = DEFAULT_AC.to_string();

        for name in names {
            if let Some(battery) = match_word(&name, "BAT") {
                batteries.push(battery);
            } else if let Some(adapter) = match_word(&name, "A") {
                ac = adapter;
            }
        }

        debug!(
            "Found {} batteries, using AC supply '{ac}'",
            batteries.len()
        );

        let state = BatteryState {
            name: batteries.first().cloned().unwrap_or_default(),
            level: -1,
            status: "N/A".to_string(),
            ac_status: false,
            capacity: 0,
            time: String::new(),
            watt: 0.0,
        };

        Self {
            root: root.to_path_buf(),
            ac,
            batteries,
            state: RwLock::new(state),
            running: AtomicBool::new(false),
            events,
        }
    }

    pub fn has_batteries(&self) -> bool {
        !self.batteries.is_empty()
    }

    /// The last computed state, or `None` if the machine has no battery.
    pub fn snapshot(&self) -> Option<BatteryState> {
        self.has_batteries()
            .then(|| read_lock!(self.state).clone())
    }

    /// Runs an update on every ACPI battery or AC adapter event.
    pub fn listen(self: &Arc<Self>, acpi: &AcpiListener) -> JoinHandle<()> {
        let controller = self.clone();

        acpi.subscribe().recv_spawn(move |line: String| {
            if line.contains("battery") || line.contains("ac_adapter") {
                trace!("ACPI event: {line}");

                let controller = controller.clone();
                tokio::spawn(async move { controller.full_update().await });
            }
        })
    }

    /// Re-reads every battery and recomputes the aggregate state.
    ///
    /// Returns `false` without doing anything
    /// if another update is already running.
    pub async fn full_update(&self) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            trace!("Battery update already running");
            return false;
        }
        let _guard = RunningGuard(&self.running);

        let mut statuses = vec![];

        let mut sum_rate_current = 0.0;
        let mut sum_rate_power = 0.0;
        let mut sum_rate_energy = 0.0;
        let mut sum_energy_now = 0.0;
        let mut sum_energy_full = 0.0;
        let mut sum_charge_full = 0.0;
        let mut sum_charge_design = 0.0;

        for name in &self.batteries {
            let dir = self.root.join(name);

            if read_number(&dir.join("present")).await != Some(1.0) {
                continue;
            }

            let rate_current = read_number(&dir.join("current_now")).await;
            let rate_voltage = read_number(&dir.join("voltage_now")).await;
            let rate_power = read_number(&dir.join("power_now")).await;
            let charge_full = read_number(&dir.join("charge_full")).await;
            let charge_design = read_number(&dir.join("charge_full_design")).await;

            let energy_now = match read_number(&dir.join("energy_now")).await {
                Some(value) => Some(value),
                None => read_number(&dir.join("charge_now")).await,
            };
            let energy_full = read_number(&dir.join("energy_full"))
                .await
                .filter(|value| *value != 0.0)
                .or(charge_full);

            statuses.push(
                read_first_line(&dir.join("status"))
                    .await
                    .unwrap_or_else(|| "N/A".to_string()),
            );

            let rate_power = rate_power.unwrap_or_default();
            let rate_current = rate_current.unwrap_or_default();

            sum_rate_current += rate_current;
            sum_rate_power += rate_power;
            sum_rate_energy += if rate_power != 0.0 {
                rate_power
            } else {
                rate_voltage.unwrap_or_default() * rate_current / 1e6
            };
            sum_energy_now += energy_now.unwrap_or_default();
            sum_energy_full += energy_full.unwrap_or_default();
            sum_charge_full += charge_full.unwrap_or_default();
            sum_charge_design += charge_design.unwrap_or_default();
        }

        let ac_status = read_number(&self.root.join(&self.ac).join("online")).await == Some(1.0);

        let status = statuses
            .iter()
            .rev()
            .find(|status| *status == "Charging" || *status == "Discharging")
            .or_else(|| statuses.first())
            .cloned()
            .unwrap_or_else(|| "N/A".to_string());

        let mut state = BatteryState {
            name: self.batteries.first().cloned().unwrap_or_default(),
            level: 0,
            status,
            ac_status,
            capacity: if sum_charge_design == 0.0 {
                0
            } else {
                (sum_charge_full / sum_charge_design * 100.0).min(100.0).floor() as u32
            },
            time: String::new(),
            watt: 0.0,
        };

        if state.status != "N/A" {
            state.level = if sum_energy_full == 0.0 {
                0
            } else {
                (sum_energy_now / sum_energy_full * 100.0 + 0.5)
                    .min(100.0)
                    .floor() as i32
            };
            state.time = "00:00".to_string();

            if state.status != "Full" && (sum_rate_power > 0.0 || sum_rate_current > 0.0) {
                let div = if sum_rate_power > 0.0 {
                    sum_rate_power
                } else {
                    sum_rate_current
                };

                let mut rate_time = if state.status == "Charging" {
                    (sum_energy_full - sum_energy_now) / div
                } else {
                    sum_energy_now / div
                };

                if 0.0 < rate_time && rate_time < 0.01 {
                    let magnitude = rate_time.log10().floor().abs() as i32;
                    rate_time *= 10_f64.powi(magnitude - 2);
                }

                state.time = format_time(rate_time);
                state.watt = sum_rate_energy / 1e6;
            }
        }

        *write_lock!(self.state) = state;

        emit(&self.events, MonitorEvent::BatteryUpdate);
        true
    }
}

/// Formats fractional hours as `HH:MM`.
fn format_time(hours: f64) -> String {
    let whole = hours.floor();
    let minutes = ((hours - whole) * 60.0).floor();
    format!("{:02}:{:02}", whole as i64, minutes as i64)
}

async fn read_first_line(path: &Path) -> Option<String> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    let line = contents
        .trim_start_matches('\u{feff}')
        .lines()
        .next()?
        .trim()
        .to_string();

    (!line.is_empty()).then_some(line)
}

async fn read_number(path: &Path) -> Option<f64> {
    read_first_line(path)
        .await
        .and_then(|line| line.parse::<i64>().ok())
        .map(|value| value as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    fn supply(root: &Path, name: &str, values: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (key, value) in values {
            fs::write(dir.join(key), format!("{value}\n")).unwrap();
        }
    }

    fn discharging() -> TempDir {
        let root = tempfile::tempdir().unwrap();
        supply(
            root.path(),
            "BAT0",
            &[
                ("present", "1"),
                ("status", "Discharging"),
                ("power_now", "10000000"),
                ("energy_now", "25000000"),
                ("energy_full", "50000000"),
                ("charge_full", "4000000"),
                ("charge_full_design", "5000000"),
                ("capacity", "50"),
            ],
        );
        supply(root.path(), "AC", &[("online", "0")]);
        root
    }

    #[test]
    fn matches_supply_names() {
        assert_eq!(match_word("BAT0", "BAT").as_deref(), Some("BAT0"));
        assert_eq!(match_word("BAT", "BAT"), None);
        assert_eq!(match_word("ADP1", "A").as_deref(), Some("ADP1"));
        assert_eq!(match_word("hidpp_battery_0", "A"), None);
    }

    #[test]
    fn formats_time() {
        assert_eq!(format_time(2.5), "02:30");
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(12.25), "12:15");
    }

    #[test]
    fn no_batteries_has_no_snapshot() {
        let root = tempfile::tempdir().unwrap();
        supply(root.path(), "AC", &[("online", "1")]);

        let (tx, _rx) = broadcast::channel(4);
        let controller = BatteryController::new(root.path(), tx);

        assert!(!controller.has_batteries());
        assert!(controller.snapshot().is_none());
    }

    #[tokio::test]
    async fn discharging_battery() {
        let root = discharging();
        let (tx, mut rx) = broadcast::channel(4);
        let controller = BatteryController::new(root.path(), tx);

        assert!(controller.full_update().await);
        assert_eq!(rx.try_recv().unwrap(), MonitorEvent::BatteryUpdate);

        let state = controller.snapshot().unwrap();
        assert_eq!(state.name, "BAT0");
        assert_eq!(state.status, "Discharging");
        assert_eq!(state.level, 50);
        assert_eq!(state.capacity, 80);
        assert_eq!(state.time, "02:30");
        assert!((state.watt - 10.0).abs() < f64::EPSILON);
        assert!(!state.ac_status);
    }

    #[tokio::test]
    async fn on_ac_without_draw() {
        let root = tempfile::tempdir().unwrap();
        supply(
            root.path(),
            "BAT1",
            &[
                ("present", "1"),
                ("status", "Not charging"),
                ("power_now", "0"),
                ("energy_now", "40000000"),
                ("energy_full", "50000000"),
            ],
        );
        supply(root.path(), "ADP1", &[("online", "1")]);

        let (tx, _rx) = broadcast::channel(4);
        let controller = BatteryController::new(root.path(), tx);
        controller.full_update().await;

        let state = controller.snapshot().unwrap();
        assert_eq!(state.status, "Not charging");
        assert!(state.ac_status);
        assert_eq!(state.level, 80);
        assert_eq!(state.time, "00:00");
        assert_eq!(state.watt, 0.0);
        assert_eq!(state.capacity, 0);
    }

    #[tokio::test]
    async fn charging_overrides_first_status() {
        let root = discharging();
        supply(
            root.path(),
            "BAT0",
            &[("status", "Unknown"), ("power_now", "0"), ("current_now", "0")],
        );
        supply(
            root.path(),
            "BAT1",
            &[
                ("present", "1"),
                ("status", "Charging"),
                ("power_now", "5000000"),
                ("energy_now", "25000000"),
                ("energy_full", "50000000"),
            ],
        );

        let (tx, _rx) = broadcast::channel(4);
        let controller = BatteryController::new(root.path(), tx);
        controller.full_update().await;

        let state = controller.snapshot().unwrap();
        assert_eq!(state.status, "Charging");
        // (100M - 50M) / 5M
        assert_eq!(state.time, "10:00");
    }

    #[tokio::test]
    async fn full_battery() {
        let root = discharging();
        supply(root.path(), "BAT0", &[("status", "Full"), ("energy_now", "50000000")]);

        let (tx, _rx) = broadcast::channel(4);
        let controller = BatteryController::new(root.path(), tx);
        controller.full_update().await;

        let state = controller.snapshot().unwrap();
        assert_eq!(state.level, 100);
        assert_eq!(state.time, "00:00");
        assert_eq!(state.watt, 0.0);
    }

    #[tokio::test]
    async fn every_pass_recomputes_from_scratch() {
        let root = discharging();
        let (tx, _rx) = broadcast::channel(4);
        let controller = BatteryController::new(root.path(), tx);

        controller.full_update().await;
        let state = controller.snapshot().unwrap();
        assert_eq!(state.level, 50);
        assert_eq!(state.time, "02:30");
        assert!((state.watt - 10.0).abs() < f64::EPSILON);

        // draw stops and the charge drops
        supply(
            root.path(),
            "BAT0",
            &[("power_now", "0"), ("energy_now", "10000000"), ("capacity", "20")],
        );
        controller.full_update().await;
        let state = controller.snapshot().unwrap();
        assert_eq!(state.status, "Discharging");
        assert_eq!(state.level, 20);
        assert_eq!(state.time, "00:00");
        assert_eq!(state.watt, 0.0);

        // battery removed
        supply(root.path(), "BAT0", &[("present", "0")]);
        controller.full_update().await;
        let state = controller.snapshot().unwrap();
        assert_eq!(state.status, "N/A");
        assert_eq!(state.level, 0);
        assert_eq!(state.time, "");
        assert_eq!(state.watt, 0.0);
        assert_eq!(state.capacity, 0);
    }

    #[tokio::test]
    async fn concurrent_update_is_dropped() {
        let root = discharging();
        let (tx, _rx) = broadcast::channel(4);
        let controller = BatteryController::new(root.path(), tx);

        let (a, b) = tokio::join!(controller.full_update(), controller.full_update());
        assert!(a);
        assert!(!b);

        // the guard is released afterwards
        assert!(controller.full_update().await);
    }
}
