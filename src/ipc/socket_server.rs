use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Notify;

use crate::error::{Result, StewardError};
use crate::ingress::EventIngress;
use crate::protocol::{event_type_of, HookResponse};

/// Unix socket server feeding hook payloads into the ingress.
pub struct IpcServer {
    socket_path: PathBuf,
    ingress: Arc<EventIngress>,
    timeout: Duration,
    shutdown_signal: Arc<Notify>,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf, ingress: Arc<EventIngress>, timeout: Duration) -> Self {
        Self {
            socket_path,
            ingress,
            timeout,
            shutdown_signal: Arc::new(Notify::new()),
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Start listening for connections. Each connection is handled in a spawned task.
    pub async fn serve(&self) -> Result<()> {
        // Remove existing socket if present
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| StewardError::Ipc {
            reason: format!(
                "failed to bind socket at {}: {}",
                self.socket_path.display(),
                e
            ),
        })?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;

        tracing::info!("listening on {}", self.socket_path.display());

        let shutdown = self.shutdown_signal.clone();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let ingress = self.ingress.clone();
                            let timeout = self.timeout;
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, ingress, timeout).await {
                                    tracing::warn!("connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!("accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.notified() => {
                    tracing::info!("socket server shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    /// Graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown_signal.notify_one();
    }
}

/// Handle a single client connection. Whatever happens to the payload, the
/// client gets a well-formed response.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    ingress: Arc<EventIngress>,
    timeout: Duration,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    buf_reader
        .read_line(&mut line)
        .await
        .map_err(|e| StewardError::Ipc {
            reason: format!("read failed: {}", e),
        })?;

    let response = match serde_json::from_str::<serde_json::Value>(line.trim()) {
        Ok(raw) => {
            let event_type = event_type_of(&raw);
            match tokio::time::timeout(timeout, ingress.submit_event(raw)).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(
                        "{} not handled within {}ms, failing open",
                        event_type.as_deref().unwrap_or("event"),
                        timeout.as_millis()
                    );
                    HookResponse::default_for_event(event_type.as_deref())
                }
            }
        }
        Err(e) => {
            tracing::warn!("invalid payload JSON: {}", e);
            HookResponse::default_for_event(None)
        }
    };

    let response_json = serde_json::to_string(&response)?;
    writer
        .write_all(response_json.as_bytes())
        .await
        .map_err(|e| StewardError::Ipc {
            reason: format!("write failed: {}", e),
        })?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| StewardError::Ipc {
            reason: format!("write newline failed: {}", e),
        })?;
    writer.shutdown().await.map_err(|e| StewardError::Ipc {
        reason: format!("shutdown failed: {}", e),
    })?;

    Ok(())
}
