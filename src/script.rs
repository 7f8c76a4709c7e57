//! Bundled control-script installation.
//!
//! The default start/stop script ships embedded in the crate and is
//! written once to a well-known temp location. Installation is an
//! explicit call owned by the hosting application; the path is
//! memoized process-wide afterwards.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::Result;

const DEPLOY_SCRIPT: &str = include_str!("../resources/deploy.sh");
const SCRIPT_DIR: &str = "stagehand-scripts";

static DEFAULT_SCRIPT: OnceLock<PathBuf> = OnceLock::new();

/// Install the bundled control script and return its path.
///
/// Idempotent: the first call copies the script out; later calls return
/// the memoized path. Concurrent first calls may both write the file,
/// with identical content.
pub fn install_default() -> Result<PathBuf> {
    if let Some(path) = DEFAULT_SCRIPT.get() {
        return Ok(path.clone());
    }

    let dir = env::temp_dir().join(SCRIPT_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join("deploy.sh");
    fs::write(&path, DEPLOY_SCRIPT)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(DEFAULT_SCRIPT.get_or_init(|| path).clone())
}
