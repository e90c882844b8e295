use crate::script::find_program;
use color_eyre::{Report, Result};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub const ACPI_LISTEN: &str = "acpi_listen";

/// Streams the lines printed by `acpi_listen` to subscribers,
/// restarting it a limited number of times when it exits.
#[derive(Debug)]
pub struct AcpiListener {
    program: String,
    args: Vec<String>,
    tx: broadcast::Sender<String>,
    restarts: Arc<AtomicU32>,
}

impl AcpiListener {
    pub const MAX_RESTARTS: u32 = 5;

    pub fn new(program: &str, args: &[&str]) -> Self {
        let (tx, _) = broadcast::channel(64);

        Self {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            tx,
            restarts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Subscribes to event lines.
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// How many times the listener process has been restarted.
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Starts the listener in the background.
    ///
    /// Returns `None` without spawning anything
    /// if the program cannot be found.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let Some(path) = find_program(&self.program) else {
            warn!(
                "'{}' was not found, ACPI events will not be received",
                self.program
            );
            return None;
        };

        let args = self.args.clone();
        let tx = self.tx.clone();
        let restarts = self.restarts.clone();

        Some(tokio::spawn(async move {
            loop {
                match Self::run(&path, &args, &tx).await {
                    Ok(status) => debug!("{} exited with {status}", path.display()),
                    Err(err) => error!("{err:?}"),
                }

                if restarts.load(Ordering::Relaxed) >= Self::MAX_RESTARTS {
                    warn!("{} exited too many times, giving up", path.display());
                    break;
                }

                restarts.fetch_add(1, Ordering::Relaxed);
                debug!("Restarting {}", path.display());
            }
        }))
    }

    async fn run(
        path: &Path,
        args: &[String],
        tx: &broadcast::Sender<String>,
    ) -> Result<ExitStatus> {
        let mut child = Command::new(path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                Report::new(err).wrap_err(format!("Failed to start {}", path.display()))
            })?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();

            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if !line.is_empty() {
                    // no subscribers is fine
                    let _ = tx.send(line.to_string());
                }
            }
        }

        Ok(child.wait().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn restarts_up_to_ceiling() {
        let listener = AcpiListener::new("echo", &["battery BAT0 00000080 00000001"]);
        let mut rx = listener.subscribe();

        listener.start().unwrap().await.unwrap();

        let mut lines = vec![];
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }

        assert_eq!(listener.restarts(), AcpiListener::MAX_RESTARTS);
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|line| line == "battery BAT0 00000080 00000001"));
    }

    #[tokio::test]
    async fn missing_program_stays_disabled() {
        let listener = AcpiListener::new("/nonexistent/bin/acpi_listen", &[]);
        let mut rx = listener.subscribe();

        assert!(listener.start().is_none());
        assert_eq!(listener.restarts(), 0);
        assert!(rx.try_recv().is_err());
    }
}
