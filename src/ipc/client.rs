use super::Ipc;
use crate::ipc::{Request, Response};
use color_eyre::Result;
use color_eyre::{Help, Report};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

impl Ipc {
    /// Sends a request to the IPC server.
    /// The server response is returned.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let stream = match UnixStream::connect(&self.path).await {
            Ok(stream) => Ok(stream),
            Err(err) => Err(Report::new(err)
                .wrap_err("Failed to connect to greeter-bridge IPC server")
                .suggestion("Is greeter-bridge running?")),
        }?;

        let (stream_read, mut stream_write) = stream.into_split();

        let mut write_buffer = serde_json::to_vec(&request)?;
        write_buffer.push(b'\n');
        stream_write.write_all(&write_buffer).await?;

        let line = BufReader::new(stream_read)
            .lines()
            .next_line()
            .await?
            .ok_or_else(|| Report::msg("Connection closed before a response was received"))?;

        let response = serde_json::from_str(&line)?;
        Ok(response)
    }
}
