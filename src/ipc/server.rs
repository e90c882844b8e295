use std::fs;
use std::path::Path;
use std::sync::Arc;

use color_eyre::{Report, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Ipc;
use crate::bridge::Bridge;
use crate::ipc::{Request, Response};
use crate::windows::{WindowSender, Windows};

const ERR_NOT_ATTACHED: &str = "Connection is not attached to a window";

/// The state of a single connection.
struct Connection<'a> {
    bridge: &'a Bridge,
    windows: &'a Windows,
    tx: WindowSender,
    window: Option<u32>,
}

impl Ipc {
    /// Starts the IPC server on its socket.
    ///
    /// Once started, the server will begin accepting connections.
    /// Each connection is served on its own task.
    pub fn start(&self, bridge: Arc<Bridge>, windows: Arc<Windows>) -> Result<JoinHandle<()>> {
        let path = self.path.clone();

        if path.exists() {
            warn!("Socket already exists. Did greeter-bridge exit abruptly?");
            warn!("Attempting IPC shutdown to allow binding to address");
            Self::shutdown(&path);
        }

        info!("Starting IPC on {}", path.display());
        let listener = UnixListener::bind(&path)
            .map_err(|err| Report::new(err).wrap_err("Unable to start IPC server"))?;

        Ok(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let bridge = bridge.clone();
                        let windows = windows.clone();

                        tokio::spawn(async move {
                            if let Err(err) =
                                Self::handle_connection(stream, &bridge, &windows).await
                            {
                                error!("{err:?}");
                            }
                        });
                    }
                    Err(err) => {
                        error!("{err:?}");
                    }
                }
            }
        }))
    }

    /// Reads requests from the connection line by line until it closes.
    ///
    /// Responses go through a queue so that signals and broadcasts
    /// for an attached window can be written at any time.
    async fn handle_connection(stream: UnixStream, bridge: &Bridge, windows: &Windows) -> Result<()> {
        let (stream_read, mut stream_write) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Response>();

        let writer = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                let mut res = match serde_json::to_vec(&response) {
                    Ok(res) => res,
                    Err(err) => {
                        error!("{:?}", Report::new(err).wrap_err("Failed to serialize response"));
                        continue;
                    }
                };
                res.push(b'\n');

                if let Err(err) = stream_write.write_all(&res).await {
                    debug!("Connection closed while writing: {err}");
                    break;
                }
            }
        });

        let mut connection = Connection {
            bridge,
            windows,
            tx,
            window: None,
        };

        let mut lines = BufReader::new(stream_read).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => connection.handle_line(&line).await,
                Ok(None) => break,
                Err(err) => {
                    debug!("Failed to read from connection: {err}");
                    break;
                }
            }
        }

        if let Some(id) = connection.window {
            windows.detach(id);
        }

        // the writer stops once every sender is gone
        drop(connection);
        writer.await?;

        Ok(())
    }

    /// Shuts down the IPC server,
    /// removing the socket file in the process.
    pub fn shutdown<P: AsRef<Path>>(path: P) {
        fs::remove_file(&path).ok();
    }
}

impl Connection<'_> {
    async fn handle_line(&mut self, line: &str) {
        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                debug!("Received request: {request:?}");
                self.handle_request(request).await
            }
            Err(err) => Some(Response::error(&format!("Invalid request: {err}"))),
        };

        if let Some(response) = response {
            // the writer only stops once the connection is gone
            let _ = self.tx.send(response);
        }
    }

    /// Runs a request, returning the response to write back, if any.
    async fn handle_request(&mut self, request: Request) -> Option<Response> {
        match request {
            Request::Ping => Some(Response::Ok),
            Request::Attach { display } => match self.window {
                Some(id) => Some(Response::error(&format!("Already attached as window {id}"))),
                None => {
                    let meta = self.windows.attach(display, self.tx.clone());
                    self.window = Some(meta.id);
                    Some(Response::Attached { id: meta.id })
                }
            },
            Request::Call {
                id,
                channel,
                args,
                invoke,
            } => match self.bridge.call(channel, &args, invoke).await {
                Ok(value) => Some(Response::Reply { id, value }),
                Err(err) => {
                    warn!("{err:?}");
                    Some(Response::Err {
                        id: Some(id),
                        message: Some(err.to_string()),
                    })
                }
            },
            Request::WindowMetadata => Some(
                self.window
                    .and_then(|id| self.windows.metadata(id))
                    .map_or_else(
                        || Response::error(ERR_NOT_ATTACHED),
                        |meta| Response::WindowMetadata { meta },
                    ),
            ),
            // the sender receives the broadcast like every other window
            Request::WindowBroadcast { data } => match self.window {
                Some(id) => self
                    .windows
                    .broadcast(id, data)
                    .err()
                    .map(|err| Response::error(&err.to_string())),
                None => Some(Response::error(ERR_NOT_ATTACHED)),
            },
            Request::PromptResponse { choice } => {
                self.bridge.prompt_response(choice);
                Some(Response::Ok)
            }
        }
    }
}
