//! mpv JSON IPC client
//!
//! mpv speaks newline-delimited JSON over a unix socket
//! (`--input-ipc-server`). Requests carry a `request_id`; replies echo it.
//! Asynchronous event lines can arrive at any time and are queued for the
//! caller.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::trace;

#[cfg(unix)]
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

/// How long to wait for a single reply
const REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors from the IPC connection
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("socket did not appear within {0:?}")]
    ConnectTimeout(Duration),
    #[error("connection closed")]
    Closed,
    #[error("no reply within {0:?}")]
    ReplyTimeout(Duration),
    #[error("mpv rejected command: {0}")]
    Command(String),
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported platform")]
    Unsupported,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An asynchronous event from mpv
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MpvEvent {
    pub event: String,
    /// For `end-file`: eof, stop, quit, error, redirect
    pub reason: Option<String>,
    pub file_error: Option<String>,
}

impl MpvEvent {
    /// `end-file` caused by a load or decode failure
    pub fn is_load_error(&self) -> bool {
        self.event == "end-file" && self.reason.as_deref() == Some("error")
    }
}

/// One line read from the socket
#[derive(Debug, Clone, PartialEq)]
pub enum IpcMessage {
    Reply {
        request_id: Option<u64>,
        error: String,
        data: Value,
    },
    Event(MpvEvent),
}

/// Parse one line of mpv output
pub fn parse_message(line: &str) -> Result<IpcMessage, serde_json::Error> {
    let value: Value = serde_json::from_str(line)?;
    if value.get("event").is_some() {
        return Ok(IpcMessage::Event(serde_json::from_value(value)?));
    }
    Ok(IpcMessage::Reply {
        request_id: value.get("request_id").and_then(Value::as_u64),
        error: value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("success")
            .to_string(),
        data: value.get("data").cloned().unwrap_or(Value::Null),
    })
}

/// Encode a command as one request line
pub fn encode_command(request_id: u64, args: &[Value]) -> String {
    let mut line = json!({ "command": args, "request_id": request_id }).to_string();
    line.push('\n');
    line
}

/// A connected IPC session
#[derive(Debug)]
pub struct MpvIpc {
    #[cfg(unix)]
    reader: BufReader<OwnedReadHalf>,
    #[cfg(unix)]
    writer: OwnedWriteHalf,
    next_id: u64,
    events: VecDeque<MpvEvent>,
    /// Bytes of a line not yet terminated; kept across timed-out reads
    pending: Vec<u8>,
}

impl MpvIpc {
    /// Connect to the socket, retrying until it appears or `timeout` elapses
    #[cfg(unix)]
    pub async fn connect(path: &Path, timeout: Duration) -> Result<Self, IpcError> {
        let start = std::time::Instant::now();
        loop {
            match tokio::net::UnixStream::connect(path).await {
                Ok(stream) => {
                    let (read, write) = stream.into_split();
                    return Ok(Self {
                        reader: BufReader::new(read),
                        writer: write,
                        next_id: 1,
                        events: VecDeque::new(),
                        pending: Vec::new(),
                    });
                }
                Err(_) if start.elapsed() < timeout => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(_) => return Err(IpcError::ConnectTimeout(timeout)),
            }
        }
    }

    #[cfg(not(unix))]
    pub async fn connect(_path: &Path, _timeout: Duration) -> Result<Self, IpcError> {
        Err(IpcError::Unsupported)
    }

    /// Send a command and wait for its reply data
    pub async fn command(&mut self, args: &[Value]) -> Result<Value, IpcError> {
        let id = self.next_id;
        self.next_id += 1;

        let line = encode_command(id, args);
        trace!(request = line.trim_end(), "mpv ipc");
        self.write_line(&line).await?;

        loop {
            let line = tokio::time::timeout(REPLY_TIMEOUT, self.read_line())
                .await
                .map_err(|_| IpcError::ReplyTimeout(REPLY_TIMEOUT))??;
            match parse_message(&line)? {
                IpcMessage::Event(event) => self.events.push_back(event),
                IpcMessage::Reply {
                    request_id: Some(rid),
                    error,
                    data,
                } if rid == id => {
                    return match error.as_str() {
                        "success" => Ok(data),
                        // Not an error for reads; e.g. duration before a file is open
                        "property unavailable" => Ok(Value::Null),
                        _ => Err(IpcError::Command(error)),
                    };
                }
                // Stale reply to an earlier timed-out request
                IpcMessage::Reply { .. } => {}
            }
        }
    }

    /// Read a property; `None` when mpv reports it unavailable
    pub async fn get_property<T: DeserializeOwned>(
        &mut self,
        name: &str,
    ) -> Result<Option<T>, IpcError> {
        let data = self.command(&[json!("get_property"), json!(name)]).await?;
        if data.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(data)?))
    }

    pub async fn set_property(&mut self, name: &str, value: Value) -> Result<(), IpcError> {
        self.command(&[json!("set_property"), json!(name), value])
            .await
            .map(|_| ())
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<MpvEvent> {
        self.events.drain(..).collect()
    }

    #[cfg(unix)]
    async fn write_line(&mut self, line: &str) -> Result<(), IpcError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn write_line(&mut self, _line: &str) -> Result<(), IpcError> {
        Err(IpcError::Unsupported)
    }

    #[cfg(unix)]
    async fn read_line(&mut self) -> Result<String, IpcError> {
        loop {
            // read_until is cancel safe: partial input stays in `pending`
            if self.reader.read_until(b'\n', &mut self.pending).await? == 0 {
                return Err(IpcError::Closed);
            }
            if !self.pending.ends_with(b"\n") {
                continue;
            }
            let bytes = std::mem::take(&mut self.pending);
            let line = String::from_utf8(bytes)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            if !line.trim().is_empty() {
                return Ok(line);
            }
        }
    }

    #[cfg(not(unix))]
    async fn read_line(&mut self) -> Result<String, IpcError> {
        Err(IpcError::Unsupported)
    }
}
