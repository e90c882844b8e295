//! Background monitors for the machine's hardware.
//!
//! Each monitor owns its state and reports changes as [`MonitorEvent`]s
//! on a broadcast channel, which the greeter forwards to every window.

pub mod acpi;
pub mod battery;
pub mod brightness;
pub mod screensaver;

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    BrightnessUpdate,
    BatteryUpdate,
}

impl MonitorEvent {
    /// The greeter signal themes subscribe to.
    pub const fn signal_name(self) -> &'static str {
        match self {
            Self::BrightnessUpdate => "brightness_update",
            Self::BatteryUpdate => "battery_update",
        }
    }
}

pub type MonitorSender = broadcast::Sender<MonitorEvent>;

/// Sends `event`, ignoring the case where nobody is listening yet.
pub fn emit(tx: &MonitorSender, event: MonitorEvent) {
    if tx.send(event).is_err() {
        tracing::trace!("No listeners for {event:?}");
    }
}
