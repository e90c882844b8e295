mod client;
pub mod commands;
pub mod responses;
mod server;

use std::path::{Path, PathBuf};
use tracing::warn;

pub use commands::{Channel, Command, Display, Request};
pub use responses::{Prompt, Response, WindowMetadata};

#[derive(Debug)]
pub struct Ipc {
    path: PathBuf,
}

impl Ipc {
    /// Creates a new IPC instance.
    /// This can be used as both a server and client.
    ///
    /// Defaults to `$XDG_RUNTIME_DIR/greeter-bridge.sock`.
    pub fn new(path: Option<PathBuf>) -> Self {
        let ipc_socket_file = path.unwrap_or_else(|| {
            std::env::var("XDG_RUNTIME_DIR")
                .map_or_else(|_| PathBuf::from("/tmp"), PathBuf::from)
                .join("greeter-bridge.sock")
        });

        if format!("{}", ipc_socket_file.display()).len() > 100 {
            warn!("The IPC socket file's absolute path exceeds 100 bytes, the socket may fail to create.");
        }

        Self {
            path: ipc_socket_file,
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}
