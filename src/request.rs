//! Deployment request definition and constructor-time validation.
//!
//! A request is validated for completeness before any side effect
//! occurs; an invalid request can never reach staging or remote
//! execution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Server runtime the application is started under on the target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Kestrel,
    Iis,
    HttpSys,
    IisExpress,
    Nginx,
}

impl ServerKind {
    /// Runtimes the remote deployer knows how to start and stop.
    pub const SUPPORTED: &'static [ServerKind] =
        &[ServerKind::Kestrel, ServerKind::Iis, ServerKind::HttpSys];

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerKind::Kestrel => "kestrel",
            ServerKind::Iis => "iis",
            ServerKind::HttpSys => "httpsys",
            ServerKind::IisExpress => "iisexpress",
            ServerKind::Nginx => "nginx",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for one remote deployment.
///
/// Immutable once validated. Credentials arrive as plain values by
/// contract of the caller; this crate does not store them anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub server: ServerKind,
    /// Target machine the application is started on.
    pub host: String,
    pub account_name: String,
    pub account_secret: String,
    /// Location reachable from both the orchestrating machine and the
    /// target host, under which per-deployment subdirectories are made.
    pub staging_root: PathBuf,
    /// Path of the executable to launch, relative to the staged root.
    pub executable_relative_path: String,
    /// Base URL the application is expected to bind to.
    pub base_url: String,
    /// Environment for the remote process. Order is preserved as given.
    #[serde(default)]
    pub environment: Vec<(String, String)>,
    /// Already-published application output on the local machine.
    pub published_root: PathBuf,
}

impl DeploymentRequest {
    /// Check the request for completeness and internal consistency.
    ///
    /// Each check is independent; the first violated one is reported
    /// with the offending field named. No I/O is performed.
    pub fn validate(&self) -> Result<()> {
        if !self.server.is_supported() {
            let supported: Vec<&str> = ServerKind::SUPPORTED
                .iter()
                .map(|s| s.as_str())
                .collect();
            return Err(Error::config(
                "server",
                format!(
                    "Server kind '{}' is not supported for remote deployment (supported: {})",
                    self.server,
                    supported.join(", ")
                ),
            ));
        }

        require_non_empty(&self.host, "host")?;
        require_non_empty(&self.account_name, "accountName")?;
        require_non_empty(&self.account_secret, "accountSecret")?;
        require_non_empty(&self.staging_root.to_string_lossy(), "stagingRoot")?;
        require_non_empty(&self.executable_relative_path, "executableRelativePath")?;
        require_non_empty(&self.base_url, "baseUrl")?;

        Ok(())
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::config(field, "Value must not be empty"))
    } else {
        Ok(())
    }
}
