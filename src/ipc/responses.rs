use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single line sent from the bridge to a renderer (or the CLI).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Attached {
        id: u32,
    },
    /// Result of a call. A missing value stands for `undefined`.
    Reply {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    Err {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        message: Option<String>,
    },
    /// The `LightDMSignal` channel.
    Signal {
        name: String,
        args: Vec<Value>,
    },
    WindowMetadata {
        meta: WindowMetadata,
    },
    WindowBroadcast {
        sender: WindowMetadata,
        data: Value,
    },
    Prompt(Prompt),
    Reload {
        theme: String,
    },
}

impl Response {
    /// Creates a new `Response::Err` not tied to any call.
    pub fn error(message: &str) -> Self {
        Self::Err {
            id: None,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// The total real-estate across all screens.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Boundary {
    #[serde(rename = "minX")]
    pub min_x: i32,
    #[serde(rename = "maxX")]
    pub max_x: i32,
    #[serde(rename = "minY")]
    pub min_y: i32,
    #[serde(rename = "maxY")]
    pub max_y: i32,
}

/// Metadata sent to each window to handle multi-monitor themes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowMetadata {
    pub id: u32,
    pub is_primary: bool,
    pub position: Position,
    pub size: Size,
    #[serde(rename = "overallBoundary")]
    pub overall_boundary: Boundary,
}

/// A blocking message box shown by the primary window.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub title: String,
    pub message: String,
    pub detail: String,
    pub buttons: Vec<String>,
}

impl Prompt {
    pub const CANCEL: usize = 0;
    pub const USE_DEFAULT_THEME: usize = 1;
    pub const RELOAD_THEME: usize = 2;

    /// An error prompt offering the theme recovery actions.
    pub fn error(message: &str, detail: &str) -> Self {
        Self {
            title: "An error ocurred".to_string(),
            message: message.to_string(),
            detail: detail.to_string(),
            buttons: vec![
                "Cancel".to_string(),
                "Use default theme".to_string(),
                "Reload theme".to_string(),
            ],
        }
    }

    /// An error prompt that can only be acknowledged.
    pub fn notice(message: &str, detail: &str) -> Self {
        Self {
            title: "An error ocurred".to_string(),
            message: message.to_string(),
            detail: detail.to_string(),
            buttons: vec!["Okay".to_string()],
        }
    }
}
