//! Artifact staging.
//!
//! Copies the published application output to the staging root under a
//! fresh deployment identifier. The resulting path is the only record
//! of where staged artifacts live, so the deployer retains it for
//! teardown.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Location of one staged deployment, created at deploy time and
/// referenced again during teardown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedDeployment {
    /// Fresh identifier for this deployment. Collisions are treated as
    /// effectively impossible; there is no retry logic.
    pub id: String,
    /// `staging_root/<id>` — root of the staged copy.
    pub remote_path: PathBuf,
    /// Full path of the executable inside the staged copy.
    pub remote_executable_path: PathBuf,
}

/// Copy the published output tree into `staging_root/<fresh id>`.
///
/// `executable_relative_path` is resolved against the staged root to
/// produce the executable path handed to the remote start script.
/// Fails with a not-found error when `local_root` is not a directory.
pub fn stage_artifacts(
    local_root: &Path,
    staging_root: &Path,
    executable_relative_path: &str,
) -> Result<StagedDeployment> {
    if !local_root.is_dir() {
        return Err(Error::PathNotFound(local_root.to_path_buf()));
    }

    let id = Uuid::new_v4().to_string();
    let remote_path = staging_root.join(&id);
    copy_tree(local_root, &remote_path)?;

    let remote_executable_path = remote_path.join(executable_relative_path);
    Ok(StagedDeployment {
        id,
        remote_path,
        remote_executable_path,
    })
}

/// Recursively copy `src` into `dst`, creating directories as needed.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let source = entry.path();
        let target = dst.join(entry.file_name());

        if source.is_dir() {
            copy_tree(&source, &target)?;
        } else {
            fs::copy(&source, &target)?;
        }
    }

    Ok(())
}
