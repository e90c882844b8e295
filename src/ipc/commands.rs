use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands sent by the CLI client to a running bridge.
#[derive(Subcommand, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Return "ok"
    Ping,

    /// Read a property or call a method on one of the greeter accessors.
    Call {
        /// The accessor to address.
        #[arg(value_enum)]
        channel: Channel,

        /// Property or method name, e.g. `hostname` or `dirlist`.
        name: String,

        /// Arguments. Each is parsed as JSON if possible,
        /// otherwise passed as a plain string.
        args: Vec<String>,
    },
}

/// The accessor channels exposed to themes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[value(name = "lightdm")]
    Lightdm,
    #[value(name = "greeter_config")]
    GreeterConfig,
    #[value(name = "theme_utils")]
    ThemeUtils,
}

/// Geometry of the display a renderer window covers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Display {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub primary: bool,
}

/// A single line sent from a renderer (or the CLI) to the bridge.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Ping,
    /// Registers the connection as the window for `display`.
    Attach { display: Display },
    Call {
        id: u64,
        channel: Channel,
        #[serde(default)]
        args: Vec<Value>,
        /// Use the asynchronous calling convention.
        #[serde(default)]
        invoke: bool,
    },
    WindowMetadata,
    WindowBroadcast {
        #[serde(default)]
        data: Value,
    },
    PromptResponse { choice: usize },
}

impl Command {
    /// Converts the CLI command into its wire request.
    pub fn into_request(self) -> Request {
        match self {
            Self::Ping => Request::Ping,
            Self::Call {
                channel,
                name,
                args,
            } => {
                let args = std::iter::once(Value::String(name))
                    .chain(args.into_iter().map(|arg| {
                        serde_json::from_str::<Value>(&arg).unwrap_or(Value::String(arg))
                    }))
                    .collect();

                Request::Call {
                    id: 1,
                    channel,
                    args,
                    invoke: true,
                }
            }
        }
    }
}
