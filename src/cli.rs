use crate::error::ExitCode;
use crate::ipc::{Command, Response};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::exit;

#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Print debug information to stderr.
    /// Same as `--mode debug`.
    #[arg(short, long, conflicts_with_all = ["normal", "mode"])]
    pub debug: bool,

    /// Run in normal mode, overriding the config file.
    /// Same as `--mode normal`.
    #[arg(short, long, conflicts_with_all = ["debug", "mode"])]
    pub normal: bool,

    /// Set the greeter mode.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Set the theme to use.
    #[arg(long)]
    pub theme: Option<String>,

    /// List the available themes and exit.
    #[arg(long)]
    pub list: bool,

    /// Print the theme API version and exit.
    #[arg(long)]
    pub api_version: bool,

    /// Path to the config file.
    /// Defaults to `$GREETER_BRIDGE_CONFIG`, then `/etc/lightdm/web-greeter.yml`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory containing the installed themes.
    #[arg(long)]
    pub theme_dir: Option<PathBuf>,

    /// Path of the IPC socket.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Format to output the response as.
    #[arg(short, long)]
    pub format: Option<Format>,
}

#[derive(Debug, Serialize, Deserialize, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Debug,
    Normal,
}

impl Args {
    /// Resolves `--debug`, `--normal` and `--mode` into a single mode, if any was given.
    pub fn mode(&self) -> Option<Mode> {
        if self.debug {
            Some(Mode::Debug)
        } else if self.normal {
            Some(Mode::Normal)
        } else {
            self.mode
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, ValueEnum, Clone, Copy)]
pub enum Format {
    #[default]
    Plain,
    Json,
}

pub fn handle_response(response: Response, format: Format) {
    let is_err = matches!(response, Response::Err { .. });

    match format {
        Format::Plain => match response {
            Response::Ok => println!("ok"),
            Response::Reply { value: Some(value), .. } => match value {
                serde_json::Value::String(value) => println!("{value}"),
                value => println!("{value}"),
            },
            Response::Reply { value: None, .. } => println!("undefined"),
            Response::Err { message, .. } => eprintln!("error\n{}", message.unwrap_or_default()),
            response => println!(
                "{}",
                serde_json::to_string(&response).expect("to be valid json")
            ),
        },
        Format::Json => println!(
            "{}",
            serde_json::to_string(&response).expect("to be valid json")
        ),
    }

    if is_err {
        exit(ExitCode::IpcResponseError as i32)
    }
}
