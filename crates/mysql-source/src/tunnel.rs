//! SSH local-forward tunnel to the source database
//!
//! The tunnel is an `ssh -N -L` child process bound to a free loopback port.
//! It is killed when closed or dropped, so a tunnel never outlives the
//! extraction call that opened it.

use std::process::Stdio;
use std::time::{Duration, Instant};

use sync_core::ExtractError;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::TunnelOpts;

/// Default time to wait for the forward to accept connections
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(15);

/// A running SSH local forward
pub struct SshTunnel {
    child: Child,
    local_port: u16,
}

impl SshTunnel {
    /// Start a forward from a free loopback port to `remote_host:remote_port`
    /// via the bastion, and wait until it accepts connections.
    pub async fn open(
        opts: &TunnelOpts,
        remote_port: u16,
        ready_timeout: Duration,
    ) -> Result<Self, ExtractError> {
        let local_port = free_local_port().await?;
        let forward = format!("{local_port}:{}:{remote_port}", opts.remote_host);

        debug!(
            "Opening SSH tunnel 127.0.0.1:{} -> {}:{} via {}@{}:{}",
            local_port, opts.remote_host, remote_port, opts.ssh_user, opts.ssh_host, opts.ssh_port
        );

        let child = Command::new("ssh")
            .args([
                "-N",
                "-L",
                &forward,
                "-p",
                &opts.ssh_port.to_string(),
                "-i",
                &opts.ssh_private_key,
                "-o",
                "ExitOnForwardFailure=yes",
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=accept-new",
                &format!("{}@{}", opts.ssh_user, opts.ssh_host),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractError::Connection(format!("Failed to start ssh: {e}")))?;

        let mut tunnel = Self { child, local_port };
        tunnel.wait_until_ready(ready_timeout).await?;
        Ok(tunnel)
    }

    /// Loopback port the forward listens on
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Waits for the forward to accept connections
    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<(), ExtractError> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if let Ok(Some(status)) = self.child.try_wait() {
                let mut stderr = String::new();
                if let Some(mut pipe) = self.child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                return Err(classify_ssh_failure(status.code(), stderr.trim()));
            }

            match TcpStream::connect(("127.0.0.1", self.local_port)).await {
                Ok(_) => {
                    debug!("SSH tunnel ready on 127.0.0.1:{}", self.local_port);
                    return Ok(());
                }
                Err(e) => {
                    debug!("Tunnel not ready yet: {}", e);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }

        let _ = self.child.kill().await;
        Err(ExtractError::Connection(format!(
            "SSH tunnel did not become ready within {} seconds",
            timeout.as_secs()
        )))
    }

    /// Stop the forward
    pub async fn close(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Failed to stop SSH tunnel (may have exited): {}", e);
        }
    }
}

/// Bind port 0 on loopback to let the OS pick a free port.
async fn free_local_port() -> Result<u16, ExtractError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| ExtractError::Connection(format!("No free local port: {e}")))?;
    listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|e| ExtractError::Connection(format!("No free local port: {e}")))
}

fn classify_ssh_failure(code: Option<i32>, stderr: &str) -> ExtractError {
    let detail = if stderr.is_empty() {
        format!("ssh exited with status {code:?}")
    } else {
        stderr.to_string()
    };
    if stderr.contains("Permission denied") {
        ExtractError::Authentication(detail)
    } else {
        ExtractError::Connection(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_free_local_port() {
        let port = free_local_port().await.unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn test_classify_ssh_failure() {
        assert!(matches!(
            classify_ssh_failure(Some(255), "deploy@bastion: Permission denied (publickey)."),
            ExtractError::Authentication(_)
        ));
        assert!(matches!(
            classify_ssh_failure(Some(255), ""),
            ExtractError::Connection(_)
        ));
    }
}
