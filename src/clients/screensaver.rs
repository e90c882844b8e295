use crate::script::exec_command;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub trait Screensaver: Send + Sync {
    /// Applies the greeter's own screensaver timeout.
    fn force(&self);

    /// Restores the timeout that was active when the greeter started.
    fn reset(&self);
}

/// Controls the X screensaver timeout through `xset`.
#[derive(Debug)]
pub struct XScreensaver {
    timeout: u32,
    initial: OnceLock<u32>,
}

impl XScreensaver {
    pub fn new(timeout: u32) -> Self {
        Self {
            timeout,
            initial: OnceLock::new(),
        }
    }

    /// The timeout when first queried. Only read once.
    fn initial_timeout(&self) -> u32 {
        *self.initial.get_or_init(|| {
            exec_command("xset", &["-q"])
                .map(|output| parse_timeout(&output).unwrap_or_default())
                .unwrap_or_else(|err| {
                    warn!("{err:?}");
                    0
                })
        })
    }

    fn set(&self, timeout: u32) {
        let timeout = timeout.to_string();
        if let Err(err) = exec_command("xset", &["s", &timeout]) {
            warn!("{err:?}");
        }
    }
}

impl Screensaver for XScreensaver {
    fn force(&self) {
        // remember the original before changing it
        self.initial_timeout();
        self.set(self.timeout);
        debug!("Screensaver set");
    }

    fn reset(&self) {
        self.set(self.initial_timeout());
        debug!("Screensaver reset");
    }
}

/// Reads the timeout from the `Screen Saver` section of `xset -q`.
fn parse_timeout(output: &str) -> Option<u32> {
    output.lines().find_map(|line| {
        line.trim_start()
            .strip_prefix("timeout:")?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    })
}
