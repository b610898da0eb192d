//! Docker container management for MySQL extraction tests

use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{new_mysql_pool, SourceOpts};

const ROOT_PASSWORD: &str = "testpass";
const DATABASE: &str = "testdb";

/// A throwaway MySQL 8 server
pub struct MySqlContainer {
    /// Container name
    pub container_name: String,
    /// Host port the server is published on
    pub host_port: u16,
    /// Image name (uses official mysql image)
    pub image_name: String,
}

impl MySqlContainer {
    pub fn new(container_name: &str, host_port: u16) -> Self {
        Self {
            container_name: container_name.to_string(),
            host_port,
            image_name: "mysql:8.0".to_string(),
        }
    }

    /// Direct (untunneled) options for the container's database
    pub fn source_opts(&self) -> SourceOpts {
        SourceOpts {
            host: "127.0.0.1".to_string(),
            port: self.host_port,
            user: "root".to_string(),
            password: ROOT_PASSWORD.to_string(),
            database: DATABASE.to_string(),
            tunnel: None,
        }
    }

    /// Replaces any container of the same name and starts a fresh one
    pub fn start(&self) -> Result<()> {
        info!("Starting MySQL container: {}", self.container_name);
        self.remove_quietly();

        let output = Command::new("docker")
            .args([
                "run",
                "--name",
                &self.container_name,
                "-e",
                &format!("MYSQL_ROOT_PASSWORD={ROOT_PASSWORD}"),
                "-e",
                &format!("MYSQL_DATABASE={DATABASE}"),
                "-p",
                &format!("{}:3306", self.host_port),
                "-d",
                &self.image_name,
            ])
            .output()
            .context("Failed to start Docker container")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to start container: {stderr}");
        }
        Ok(())
    }

    /// Polls `SELECT 1` until the server answers
    pub async fn wait_until_ready(&self, timeout_secs: u64) -> Result<()> {
        let start = Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        while start.elapsed() < timeout {
            match self.execute(&["SELECT 1"]).await {
                Ok(()) => {
                    info!("MySQL is ready");
                    return Ok(());
                }
                Err(e) => {
                    debug!("Connection attempt failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
            }
        }

        anyhow::bail!("MySQL did not become ready within {timeout_secs} seconds")
    }

    /// Runs statements in order on one connection
    pub async fn execute(&self, statements: &[&str]) -> Result<()> {
        use mysql_async::prelude::*;

        let opts = self.source_opts();
        let pool = new_mysql_pool(&opts, &opts.host, opts.port);
        let mut conn = pool.get_conn().await.context("Failed to get connection")?;
        for statement in statements {
            conn.query_drop(*statement)
                .await
                .with_context(|| format!("Failed to execute: {statement}"))?;
        }
        drop(conn);
        pool.disconnect()
            .await
            .context("Failed to disconnect pool")?;
        Ok(())
    }

    /// Stops and removes the container
    pub fn stop(&self) {
        info!("Stopping container: {}", self.container_name);
        self.remove_quietly();
    }

    fn remove_quietly(&self) {
        for action in ["stop", "rm"] {
            let _ = Command::new("docker")
                .args([action, &self.container_name])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

impl Drop for MySqlContainer {
    fn drop(&mut self) {
        self.stop();
    }
}
