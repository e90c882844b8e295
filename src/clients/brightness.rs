use super::{MonitorEvent, MonitorSender, emit};
use crate::config::BacklightConfig;
use crate::lock;
use color_eyre::{Report, Result};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const SYS_PATH: &str = "/sys/class/backlight";

/// Total duration of a stepped brightness transition.
const TRANSITION: Duration = Duration::from_millis(200);

/// Picks the backlight device to control:
/// the first directory under `root`, by name.
pub fn default_resource_name(root: &Path) -> Option<String> {
    let mut possible_files = fs::read_dir(root)
        .map(|entries| {
            entries
                .flatten()
                .filter(|entry| entry.path().is_dir())
                .filter_map(|entry| entry.file_name().to_str().map(ToString::to_string))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    possible_files.sort();

    possible_files.into_iter().next()
}

/// A backlight device which is known to be readable and writable.
#[derive(Debug, Clone)]
struct Device {
    brightness_path: PathBuf,
    max_brightness: u32,
}

impl Device {
    fn open(dir: &Path) -> Result<Self> {
        let brightness_path = dir.join("brightness");
        let max_path = dir.join("max_brightness");

        fs::read_to_string(&brightness_path).map_err(|err| {
            Report::new(err).wrap_err(format!("Cannot read {}", brightness_path.display()))
        })?;

        OpenOptions::new()
            .write(true)
            .open(&brightness_path)
            .map_err(|err| {
                Report::new(err).wrap_err(format!("Cannot write to {}", brightness_path.display()))
            })?;

        let max_brightness = fs::read_to_string(&max_path)
            .map_err(|err| Report::new(err).wrap_err(format!("Cannot read {}", max_path.display())))?
            .trim()
            .parse()?;

        Ok(Self {
            brightness_path,
            max_brightness,
        })
    }

    fn read_raw(&self) -> Option<u32> {
        fs::read_to_string(&self.brightness_path)
            .ok()
            .and_then(|value| value.trim().parse().ok())
    }

    /// Reads the brightness as a percentage of the maximum.
    fn read_percent(&self) -> i32 {
        match self.read_raw() {
            Some(raw) if self.max_brightness > 0 => {
                (f64::from(raw) * 100.0 / f64::from(self.max_brightness)).round() as i32
            }
            _ => -1,
        }
    }

    /// Converts a percentage into a raw value in `[0, max]`.
    fn raw_for(&self, percent: f64) -> u32 {
        let max = f64::from(self.max_brightness);
        (percent * max / 100.0).clamp(0.0, max).round() as u32
    }

    fn write_percent(&self, percent: f64) {
        let raw = self.raw_for(percent);
        if let Err(err) = fs::write(&self.brightness_path, raw.to_string()) {
            error!(
                "{:?}",
                Report::new(err).wrap_err("Failed to write brightness")
            );
        }
    }
}

/// Reads and controls the display backlight through sysfs.
///
/// Changes are made in `steps` equal steps spread over 200ms,
/// and every change to the brightness file is reported
/// as [`MonitorEvent::BrightnessUpdate`].
pub struct BrightnessController {
    device: Option<Device>,
    steps: u32,
    delay: Duration,
    events: MonitorSender,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl BrightnessController {
    pub fn new(root: &Path, config: &BacklightConfig, events: MonitorSender) -> Self {
        let steps = config.steps.max(1);

        let device = if config.enabled {
            default_resource_name(root).and_then(|name| {
                Device::open(&root.join(&name))
                    .inspect(|_| debug!("Using backlight device '{name}'"))
                    .map_err(|err| error!("{err:?}"))
                    .ok()
            })
        } else {
            debug!("Backlight control is disabled");
            None
        };

        if config.enabled && device.is_none() {
            warn!("No usable backlight device found in {}", root.display());
        }

        Self {
            device,
            steps,
            delay: TRANSITION / steps,
            events,
            watcher: Mutex::new(None),
        }
    }

    /// Starts watching the brightness file for changes.
    pub fn watch(&self) {
        let Some(device) = &self.device else {
            return;
        };

        let tx = self.events.clone();
        let watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event)
                if matches!(
                    event.kind,
                    EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
                ) =>
            {
                emit(&tx, MonitorEvent::BrightnessUpdate);
            }
            Err(err) => error!("Error occurred when watching brightness: {err:?}"),
            _ => {}
        });

        let watcher = watcher.and_then(|mut watcher| {
            watcher
                .watch(&device.brightness_path, RecursiveMode::NonRecursive)
                .map(|()| watcher)
        });

        match watcher {
            // keep the watcher alive for as long as the controller
            Ok(watcher) => *lock!(self.watcher) = Some(watcher),
            Err(err) => error!(
                "{:?}",
                Report::new(err).wrap_err("Failed to start brightness watcher")
            ),
        }
    }

    pub fn is_available(&self) -> bool {
        self.device.is_some()
    }

    pub fn max_brightness(&self) -> u32 {
        self.device.as_ref().map_or(0, |device| device.max_brightness)
    }

    /// The current brightness in percent, or `-1` if unavailable.
    pub fn brightness(&self) -> i32 {
        self.device.as_ref().map_or(-1, Device::read_percent)
    }

    /// Moves the brightness to `value` percent.
    ///
    /// With more than one step the change runs in the background.
    /// A new transition does not cancel one already running.
    pub fn set_brightness(&self, value: i32) {
        let Some(device) = self.device.clone() else {
            return;
        };

        let target = f64::from(value);
        if self.steps <= 1 {
            device.write_percent(target);
            return;
        }

        let current = f64::from(device.read_percent());
        let steps = self.steps;
        let delay = self.delay;

        tokio::spawn(async move {
            for i in 0..=steps {
                tokio::time::sleep(delay).await;
                let value = current + (target - current) * f64::from(i) / f64::from(steps);
                device.write_percent(value);
            }
        });
    }

    pub fn increase(&self, value: i32) {
        self.set_brightness(self.brightness().saturating_add(value));
    }

    pub fn decrease(&self, value: i32) {
        self.set_brightness(self.brightness().saturating_sub(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    fn backlight(max: u32, current: u32) -> TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("intel_backlight");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("max_brightness"), format!("{max}\n")).unwrap();
        fs::write(dir.join("brightness"), format!("{current}\n")).unwrap();
        root
    }

    fn config(steps: u32) -> BacklightConfig {
        BacklightConfig {
            enabled: true,
            value: 10,
            steps,
        }
    }

    fn raw(root: &TempDir) -> String {
        fs::read_to_string(root.path().join("intel_backlight/brightness")).unwrap()
    }

    #[test]
    fn picks_first_device_by_name() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("intel_backlight")).unwrap();
        fs::create_dir(root.path().join("acpi_video0")).unwrap();
        fs::write(root.path().join("aaa"), "").unwrap();

        assert_eq!(
            default_resource_name(root.path()).as_deref(),
            Some("acpi_video0")
        );

        fs::remove_dir(root.path().join("acpi_video0")).unwrap();
        assert_eq!(
            default_resource_name(root.path()).as_deref(),
            Some("intel_backlight")
        );
    }

    #[test]
    fn reads_percentage() {
        let root = backlight(255, 128);
        let (tx, _rx) = broadcast::channel(4);
        let controller = BrightnessController::new(root.path(), &config(0), tx);

        assert!(controller.is_available());
        assert_eq!(controller.max_brightness(), 255);
        assert_eq!(controller.brightness(), 50);
    }

    #[test]
    fn unavailable_reads_minus_one() {
        let root = tempfile::tempdir().unwrap();
        let (tx, _rx) = broadcast::channel(4);
        let controller = BrightnessController::new(root.path(), &config(0), tx);

        assert!(!controller.is_available());
        assert_eq!(controller.brightness(), -1);

        // no-op rather than an error
        controller.set_brightness(50);
    }

    #[test]
    fn disabled_in_config() {
        let root = backlight(100, 40);
        let (tx, _rx) = broadcast::channel(4);
        let config = BacklightConfig {
            enabled: false,
            ..config(0)
        };

        let controller = BrightnessController::new(root.path(), &config, tx);
        assert!(!controller.is_available());

        controller.set_brightness(50);
        controller.increase(10);
        assert_eq!(raw(&root), "40\n");
    }

    #[test]
    fn instant_write_is_clamped() {
        let root = backlight(200, 100);
        let (tx, _rx) = broadcast::channel(4);
        let controller = BrightnessController::new(root.path(), &config(1), tx);

        controller.set_brightness(75);
        assert_eq!(raw(&root), "150");

        controller.set_brightness(150);
        assert_eq!(raw(&root), "200");

        controller.set_brightness(-20);
        assert_eq!(raw(&root), "0");
    }

    #[test]
    fn increase_and_decrease() {
        let root = backlight(100, 40);
        let (tx, _rx) = broadcast::channel(4);
        let controller = BrightnessController::new(root.path(), &config(0), tx);

        controller.increase(10);
        assert_eq!(controller.brightness(), 50);

        controller.decrease(30);
        assert_eq!(controller.brightness(), 20);
    }

    #[test]
    fn extreme_steps_saturate() {
        let root = backlight(100, 50);
        let (tx, _rx) = broadcast::channel(4);
        let controller = BrightnessController::new(root.path(), &config(0), tx);

        controller.increase(i32::MAX);
        assert_eq!(raw(&root), "100");

        controller.decrease(i32::MAX);
        assert_eq!(raw(&root), "0");

        controller.increase(i32::MIN);
        assert_eq!(raw(&root), "0");

        controller.decrease(i32::MIN);
        assert_eq!(raw(&root), "100");
    }

    #[tokio::test]
    async fn stepped_transition_reaches_target() {
        let root = backlight(100, 0);
        let (tx, _rx) = broadcast::channel(4);
        let controller = BrightnessController::new(root.path(), &config(4), tx);

        controller.set_brightness(80);

        // 5 writes, 50ms apart
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(raw(&root), "80");
    }

    #[tokio::test]
    async fn stepped_transition_is_clamped() {
        let root = backlight(100, 50);
        let (tx, _rx) = broadcast::channel(4);
        let controller = BrightnessController::new(root.path(), &config(4), tx);

        controller.set_brightness(150);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(raw(&root), "100");
        assert_eq!(controller.brightness(), 100);

        controller.set_brightness(-20);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(raw(&root), "0");
        assert_eq!(controller.brightness(), 0);
    }
}
