//! Build-output collaborator.
//!
//! Producing the published application output is an external step; the
//! deployer only needs a directory path back from it.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::request::DeploymentRequest;

/// Supplies the local published-output directory for a request.
pub trait Publisher: Send + Sync {
    fn publish(&self, request: &DeploymentRequest) -> Result<PathBuf>;
}

/// Publisher for output that was already built out-of-band: returns the
/// request's configured published root after checking it exists.
pub struct PrebuiltPublisher;

impl Publisher for PrebuiltPublisher {
    fn publish(&self, request: &DeploymentRequest) -> Result<PathBuf> {
        let root = &request.published_root;
        if !root.is_dir() {
            return Err(Error::PathNotFound(root.clone()));
        }
        Ok(root.clone())
    }
}
