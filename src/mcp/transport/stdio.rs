// ABOUTME: Stdio transport for MCP communication.
// ABOUTME: Spawns a subprocess and exchanges line-delimited JSON-RPC over stdin/stdout.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Transport;
use crate::error::McpError;
use crate::mcp::{McpNotification, McpRequest, McpResponse};

type PendingMap = Arc<Mutex<HashMap<u64, mpsc::Sender<McpResponse>>>>;

const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Stdio transport - spawns a subprocess and communicates via JSON-RPC over stdin/stdout.
///
/// Resources are acquired in the order child, stdin, reader task and are
/// released in the reverse order by [`Transport::shutdown`].
pub struct StdioTransport {
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    pending: PendingMap,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl StdioTransport {
    /// Create a new stdio transport by spawning a subprocess.
    ///
    /// If any step after the spawn fails, the subprocess is killed before the
    /// error is returned.
    pub async fn connect(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env.iter())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::Connection(format!("failed to spawn '{}': {}", command, e)))?;

        let pipes = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => Ok((stdin, stdout)),
            (None, _) => Err(McpError::Connection("Failed to open stdin".into())),
            (_, None) => Err(McpError::Connection("Failed to open stdout".into())),
        };
        let (stdin, stdout) = match pipes {
            Ok(pipes) => pipes,
            Err(e) => {
                if let Err(kill_err) = child.kill().await {
                    warn!(command, error = %kill_err, "failed to kill partially started server");
                }
                return Err(e);
            }
        };

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let pending_clone = pending.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) else {
                    debug!(line = %line, "ignoring non-JSON line from server");
                    continue;
                };
                // Server-initiated requests and notifications carry a method.
                if value.get("method").is_some() {
                    continue;
                }
                if let Ok(response) = serde_json::from_value::<McpResponse>(value) {
                    let tx = pending_clone.lock().await.remove(&response.id);
                    if let Some(tx) = tx {
                        let _ = tx.send(response).await;
                    }
                }
            }
            // Dropping the senders wakes every waiter with "no response".
            pending_clone.lock().await.clear();
        });

        Ok(Self {
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            pending,
            reader_handle: Mutex::new(Some(reader_handle)),
            request_timeout,
        })
    }

    async fn write_line(&self, json: String) -> Result<(), McpError> {
        let mut stdin = self.stdin.lock().await;
        let stdin_ref = stdin
            .as_mut()
            .ok_or_else(|| McpError::Connection("Server connection closed".into()))?;
        stdin_ref.write_all(json.as_bytes()).await?;
        stdin_ref.write_all(b"\n").await?;
        stdin_ref.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, request: McpRequest) -> Result<McpResponse, McpError> {
        let id = request.id;

        let (tx, mut rx) = mpsc::channel(1);
        self.pending.lock().await.insert(id, tx);

        let write_result = match serde_json::to_string(&request) {
            Ok(json) => self.write_line(json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = write_result {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx.recv()).await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(McpError::Protocol("No response received".into())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Protocol(format!(
                    "Request '{}' timed out after {:?}",
                    request.method, self.request_timeout
                )))
            }
        }
    }

    async fn notify(&self, notification: McpNotification) -> Result<(), McpError> {
        let json = serde_json::to_string(&notification)?;
        self.write_line(json).await
    }

    async fn shutdown(&self) -> Result<(), McpError> {
        let mut result = Ok(());

        if let Some(handle) = self.reader_handle.lock().await.take() {
            handle.abort();
        }
        self.pending.lock().await.clear();

        // Closing stdin is the polite exit signal for stdio servers.
        self.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            if tokio::time::timeout(EXIT_GRACE, child.wait()).await.is_err() {
                if let Err(e) = child.kill().await {
                    result = Err(McpError::Io(e));
                }
            }
        }

        result
    }
}
