//! MySQL watermark extraction for warehouse-sync
//!
//! Pulls rows whose watermark column is past a given position, optionally
//! through an SSH local forward. Every call opens its own tunnel and pool and
//! tears both down before returning.

mod client;
mod extractor;
#[cfg(feature = "testing")]
pub mod testing;
mod tunnel;

pub use client::{new_mysql_pool, quote_identifier, sanitize_connection_string};
pub use extractor::MySqlExtractor;
pub use tunnel::SshTunnel;

use serde::Deserialize;
use std::fmt;

/// MySQL source connection options
#[derive(Clone, Deserialize)]
pub struct SourceOpts {
    /// Database host (as seen from the tunnel endpoint when tunneling)
    pub host: String,
    /// Database port
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    /// Database user
    pub user: String,
    /// Database password
    #[serde(default)]
    pub password: String,
    /// Source database name
    pub database: String,
    /// SSH tunnel; connect directly when absent
    #[serde(default)]
    pub tunnel: Option<TunnelOpts>,
}

impl SourceOpts {
    /// Connection URI with the password masked, for logs and errors.
    pub fn display_uri(&self) -> String {
        sanitize_connection_string(&format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        ))
    }
}

impl fmt::Debug for SourceOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOpts")
            .field("uri", &self.display_uri())
            .field("tunnel", &self.tunnel)
            .finish()
    }
}

/// SSH local-forward options
#[derive(Clone, Debug, Deserialize)]
pub struct TunnelOpts {
    /// Bastion host
    pub ssh_host: String,
    /// Bastion SSH port
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// Login user on the bastion
    pub ssh_user: String,
    /// Path to the private key file
    pub ssh_private_key: String,
    /// Database host as reachable from the bastion
    #[serde(default = "default_remote_host")]
    pub remote_host: String,
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_ssh_port() -> u16 {
    22
}

fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}
