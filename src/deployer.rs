//! Deployment lifecycle controller.
//!
//! Sequences validation → staging → remote start, and on disposal
//! remote stop → remote artifact cleanup → local artifact cleanup.
//! Teardown is best-effort: each cleanup step is attempted and its
//! failure logged, never re-raised, so cleanup over many deployments
//! cannot be aborted by one bad host.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::logger::{Logger, StderrLogger};
use crate::publish::{PrebuiltPublisher, Publisher};
use crate::request::DeploymentRequest;
use crate::runner::{CommandRunner, DeployAction, ScriptRunner};
use crate::stage::{self, StagedDeployment};

/// Caller-facing result of a successful deploy: where the application
/// should now be reachable, plus an echo of the request that produced
/// it. Process lifetime stays with the remote host; the handle only
/// references it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentHandle {
    pub base_url: String,
    pub request: DeploymentRequest,
}

/// Orchestrates one remote deployment from validated request to
/// torn-down instance.
///
/// Lifecycle is strictly forward: `Created → Deployed → Disposed`.
/// `dispose` is idempotent and also runs from `Drop`, so a deployer
/// leaving scope still cleans up after itself.
pub struct RemoteDeployer {
    request: DeploymentRequest,
    logger: Arc<dyn Logger>,
    publisher: Box<dyn Publisher>,
    runner: Box<dyn CommandRunner>,
    staged: Option<StagedDeployment>,
    published_root: Option<PathBuf>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for RemoteDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDeployer")
            .field("request", &self.request)
            .field("staged", &self.staged)
            .field("published_root", &self.published_root)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl RemoteDeployer {
    /// Deployer with the default collaborators: stderr logging,
    /// prebuilt published output, and the bundled control script.
    ///
    /// The request is validated here, before any side effect.
    pub fn new(request: DeploymentRequest) -> Result<Self> {
        let logger: Arc<dyn Logger> = Arc::new(StderrLogger);
        let runner = ScriptRunner::with_default_script(Arc::clone(&logger))?;
        Self::with_collaborators(request, logger, Box::new(PrebuiltPublisher), Box::new(runner))
    }

    /// Deployer with explicit collaborators. Validation still happens
    /// up front; an invalid request never constructs a deployer.
    pub fn with_collaborators(
        request: DeploymentRequest,
        logger: Arc<dyn Logger>,
        publisher: Box<dyn Publisher>,
        runner: Box<dyn CommandRunner>,
    ) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            request,
            logger,
            publisher,
            runner,
            staged: None,
            published_root: None,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn request(&self) -> &DeploymentRequest {
        &self.request
    }

    /// Publish, stage, and start the application on the target host.
    ///
    /// Errors propagate unmodified; no partial-state repair is
    /// attempted here. Artifacts staged before a failed start stay in
    /// place until `dispose` runs.
    pub fn deploy(&mut self) -> Result<DeploymentHandle> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed);
        }
        // Lifecycle is single-transition: a second deploy would orphan
        // the first staged tree, since teardown only tracks one.
        if self.staged.is_some() {
            return Err(Error::AlreadyDeployed);
        }

        let published_root = self.publisher.publish(&self.request)?;
        self.published_root = Some(published_root.clone());

        let staged = stage::stage_artifacts(
            &published_root,
            &self.request.staging_root,
            &self.request.executable_relative_path,
        )?;
        self.logger.info(&format!(
            "[{}] Staged deployment {} at {}",
            self.request.host,
            staged.id,
            staged.remote_path.display()
        ));
        let remote_executable = staged.remote_executable_path.clone();
        self.staged = Some(staged);

        self.runner
            .run(DeployAction::Start, &self.request, &remote_executable)?;

        self.logger.info(&format!(
            "[{}] Application started at {}",
            self.request.host, self.request.base_url
        ));

        Ok(DeploymentHandle {
            base_url: self.request.base_url.clone(),
            request: self.request.clone(),
        })
    }

    /// Tear the deployment down: stop the remote process, delete the
    /// staged artifacts, delete the local published output.
    ///
    /// Idempotent; a second call is a no-op. Never fails from the
    /// caller's point of view: each step runs independently and its
    /// failure is logged at warning level.
    pub fn dispose(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(staged) = &self.staged {
            if let Err(err) = self.runner.run(
                DeployAction::Stop,
                &self.request,
                &staged.remote_executable_path,
            ) {
                self.logger.warn(
                    &format!("Failed to stop remote process on '{}'", self.request.host),
                    Some(&err),
                );
            }
        }

        if let Some(staged) = &self.staged {
            if let Err(err) = remove_tree(&staged.remote_path) {
                self.logger.warn(
                    &format!(
                        "Failed to delete staged artifacts at {}",
                        staged.remote_path.display()
                    ),
                    Some(&err),
                );
            }
        }

        if let Some(published_root) = &self.published_root {
            if let Err(err) = remove_tree(published_root) {
                self.logger.warn(
                    &format!(
                        "Failed to delete published output at {}",
                        published_root.display()
                    ),
                    Some(&err),
                );
            }
        }
    }
}

impl Drop for RemoteDeployer {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn remove_tree(path: &Path) -> Result<()> {
    fs::remove_dir_all(path)?;
    Ok(())
}
