//! One-shot bootstrap for a server subprocess.
//!
//! Attaches to an already-running server when one is listening; otherwise
//! spawns the configured command and probes its TCP port until it accepts a
//! connection. Deliberately decoupled from the pool: all this knows is how
//! to start a process and detect readiness by successful connection.

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::Duration;

use crate::error::PoolError;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Server command and arguments.
    pub command: String,
    pub args: Vec<String>,
    /// Address the server is expected to listen on, e.g. `127.0.0.1:5005`.
    pub addr: String,
    /// Connection probes before giving up on a spawned server.
    pub attempts: u32,
    /// Pause between probes.
    pub retry_interval: Duration,
}

impl RemoteConfig {
    pub fn new(command: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            addr: addr.into(),
            attempts: 100,
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// Handle on a reachable server, either spawned here or attached to.
#[derive(Debug)]
pub struct Remote {
    config: RemoteConfig,
    process: Option<Child>,
}

impl Remote {
    /// Attach to a listening server, or spawn one and wait for readiness.
    pub async fn connect_or_spawn(config: RemoteConfig) -> Result<Self, PoolError> {
        if TcpStream::connect(&config.addr).await.is_ok() {
            tracing::info!(addr = %config.addr, "attached to an existing server");
            return Ok(Self {
                config,
                process: None,
            });
        }

        tracing::info!(addr = %config.addr, command = %config.command, "spawning a new server");
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(PoolError::Spawn)?;

        for attempts_left in (0..config.attempts).rev() {
            if TcpStream::connect(&config.addr).await.is_ok() {
                tracing::info!(addr = %config.addr, "server is ready");
                return Ok(Self {
                    config,
                    process: Some(child),
                });
            }
            tracing::debug!(addr = %config.addr, attempts_left, "server not ready yet");
            tokio::time::sleep(config.retry_interval).await;
        }

        // the server never came up; don't leave the child behind
        let _ = child.kill().await;
        Err(PoolError::ServerUnavailable {
            addr: config.addr,
            attempts: config.attempts,
        })
    }

    /// Whether this handle owns the server process (spawned rather than
    /// attached).
    pub fn is_spawned(&self) -> bool {
        self.process.is_some()
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Open a fresh connection to the server.
    pub async fn connect(&self) -> std::io::Result<TcpStream> {
        TcpStream::connect(&self.config.addr).await
    }

    /// Stop the server, but only if this handle spawned it. Best-effort:
    /// errors from a process that already exited are swallowed.
    pub async fn shutdown(mut self) {
        if let Some(mut child) = self.process.take() {
            tracing::info!(addr = %self.config.addr, "stopping the spawned server");
            let _ = child.kill().await;
        }
    }
}
