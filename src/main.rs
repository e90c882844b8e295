#![doc = include_str!("../README.md")]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::{Arc, mpsc};

use clap::Parser;
use color_eyre::Report;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::{block_in_place, spawn_blocking};
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;

use crate::bridge::{Bridge, Greeter, GreeterConfig, ThemeUtils};
use crate::clients::acpi::{ACPI_LISTEN, AcpiListener};
use crate::clients::battery::{self, BatteryController};
use crate::clients::brightness::{self, BrightnessController};
use crate::clients::screensaver::XScreensaver;
use crate::config::{Config, DEFAULT_THEME_DIR};
use crate::error::ExitCode;
use crate::ipc::Ipc;
use crate::lightdm::SystemSession;
use crate::windows::Windows;

mod bridge;
mod channels;
mod cli;
mod clients;
mod config;
mod error;
mod ipc;
mod lightdm;
mod logging;
mod macros;
mod script;
mod windows;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the API themes are written against.
const API_VERSION: &str = "1.0.0";

#[tokio::main]
async fn main() {
    let mut args = cli::Args::parse();

    if args.api_version {
        println!("{API_VERSION}");
        return;
    }

    let _guard = install_logging(args.mode() == Some(cli::Mode::Debug));

    match args.command.take() {
        Some(command) => {
            let ipc = Ipc::new(args.socket);
            match ipc.send(command.into_request()).await {
                Ok(res) => cli::handle_response(res, args.format.unwrap_or_default()),
                Err(err) => {
                    error!("{err:?}");
                    exit(ExitCode::CliError as i32);
                }
            }
        }
        None => start_bridge(args).await,
    }
}

fn install_logging(debug: bool) -> Option<WorkerGuard> {
    if let Err(err) = color_eyre::install() {
        eprintln!("Failed to install error report handler: {err:?}");
    }

    match logging::install_tracing(debug) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Failed to install logging: {err:?}");
            None
        }
    }
}

async fn start_bridge(args: cli::Args) {
    info!("greeter-bridge version {VERSION}");

    let mut config = Config::load_or_default(args.config.as_deref());
    config.apply_overrides(args.mode(), args.theme.as_deref());

    let theme_root = args
        .theme_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_THEME_DIR));

    if args.list {
        list_themes(&theme_root);
        return;
    }

    let theme_dir = config::resolve_theme_dir(&config.greeter.theme, &theme_root);
    debug!("Using theme directory {}", theme_dir.display());

    let features = config.features.clone();
    let screensaver_timeout = config.greeter.screensaver_timeout;
    let config = arc_rw!(config);

    let session = Arc::new(SystemSession::new().await);
    let windows = Arc::new(Windows::new());
    let (monitor_tx, monitor_rx) = broadcast::channel(32);

    let brightness = Arc::new(BrightnessController::new(
        Path::new(brightness::SYS_PATH),
        &features.backlight,
        monitor_tx.clone(),
    ));
    brightness.watch();

    let battery = features.battery.then(|| {
        let controller = Arc::new(BatteryController::new(
            Path::new(battery::SYS_PATH),
            monitor_tx.clone(),
        ));

        let acpi = AcpiListener::new(ACPI_LISTEN, &[]);
        controller.listen(&acpi);
        acpi.start();

        let initial = controller.clone();
        tokio::spawn(async move { initial.full_update().await });

        controller
    });

    let greeter = Greeter::new(
        session.clone(),
        windows.clone(),
        brightness,
        battery,
        Arc::new(XScreensaver::new(screensaver_timeout)),
        features,
    );
    greeter.forward_signals(monitor_rx);

    let theme_utils = ThemeUtils::new(
        config.clone(),
        theme_root.clone(),
        theme_dir,
        greeter.shared_data_directory().to_string(),
    );
    let greeter_config = GreeterConfig::new(config.clone(), session);

    let bridge = Arc::new(Bridge::new(
        config,
        theme_root,
        windows.clone(),
        greeter,
        greeter_config,
        theme_utils,
    ));

    let ipc = Ipc::new(args.socket);
    let server = match ipc.start(bridge, windows) {
        Ok(server) => server,
        Err(err) => {
            error!("{err:?}");
            exit(ExitCode::IpcServer as i32);
        }
    };

    let (tx, rx) = mpsc::channel();

    let ipc_path = ipc.path().to_path_buf();
    spawn_blocking(move || {
        if rx.recv().is_err() {
            error!("Shutdown handler stopped unexpectedly");
        }

        info!("Shutting down");
        Ipc::shutdown(ipc_path);

        exit(0);
    });

    if let Err(err) = ctrlc::set_handler(move || {
        // the receiver only goes away on shutdown
        let _ = tx.send(());
    }) {
        error!("{:?}", Report::new(err).wrap_err("Error setting Ctrl-C handler"));
    }

    if let Err(err) = server.await {
        error!("{:?}", Report::new(err).wrap_err("IPC server stopped"));
        exit(ExitCode::IpcServer as i32);
    }
}

fn list_themes(theme_root: &Path) {
    match config::list_themes(theme_root) {
        Ok(themes) => {
            for theme in themes {
                println!("{theme}");
            }
        }
        Err(err) => {
            error!(
                "{:?}",
                Report::new(err).wrap_err(format!("Failed to list themes in {}", theme_root.display()))
            );
            exit(ExitCode::ConfigError as i32);
        }
    }
}

/// Blocks on a `Future` until it resolves.
///
/// This is not an `async` operation
/// so can be used outside of an async function.
///
/// Do note it must be called from within a Tokio runtime still.
///
/// Use sparingly! Prefer async functions wherever possible.
#[allow(dead_code)]
pub fn await_sync<F: Future>(f: F) -> F::Output {
    block_in_place(|| Handle::current().block_on(f))
}
