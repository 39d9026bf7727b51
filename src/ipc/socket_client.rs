use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::error::{Result, StewardError};

/// Upper bound on a daemon answer.
const MAX_RESPONSE_BYTES: u64 = 1 << 20;

/// Forwards one hook payload to the daemon: a JSON line out, a JSON line back.
pub struct HookClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl HookClient {
    pub fn new(socket_path: PathBuf, timeout: Duration) -> Self {
        Self {
            socket_path,
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// The deadline covers connect, write and read together, so a wedged
    /// daemon costs the hook at most `timeout`.
    pub async fn send(&self, payload: &Value) -> Result<Value> {
        let mut line = serde_json::to_string(payload)?;
        line.push('\n');

        match tokio::time::timeout(self.timeout, self.exchange(line)).await {
            Ok(result) => result,
            Err(_) => Err(StewardError::ResponseTimeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn exchange(&self, line: String) -> Result<Value> {
        let (reader, mut writer) = self.connect().await?.into_split();

        writer.write_all(line.as_bytes()).await.map_err(io_step("write"))?;
        writer.shutdown().await.map_err(io_step("shutdown"))?;

        let mut reply = String::new();
        BufReader::new(reader.take(MAX_RESPONSE_BYTES))
            .read_line(&mut reply)
            .await
            .map_err(io_step("read"))?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(StewardError::Ipc {
                reason: "daemon closed the connection without answering".into(),
            });
        }
        serde_json::from_str(reply).map_err(|e| StewardError::Ipc {
            reason: format!("invalid response JSON: {}", e),
        })
    }

    /// No socket file and a socket file left behind by a dead daemon both
    /// mean there is no daemon.
    async fn connect(&self) -> Result<UnixStream> {
        match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => Ok(stream),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused) => {
                Err(StewardError::SocketNotFound {
                    path: self.socket_path.clone(),
                })
            }
            Err(e) => Err(StewardError::Ipc {
                reason: format!("connect to {} failed: {}", self.socket_path.display(), e),
            }),
        }
    }
}

fn io_step(step: &'static str) -> impl Fn(std::io::Error) -> StewardError {
    move |e| StewardError::Ipc {
        reason: format!("{} failed: {}", step, e),
    }
}
