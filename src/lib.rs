//! Remote deployment orchestration for network test harnesses.
//!
//! Takes a previously published application, stages it on a location
//! reachable by the target host, starts it under the requested server
//! runtime via a control script, and tears everything down afterwards
//! with best-effort cleanup.

pub mod deployer;
pub mod error;
pub mod logger;
pub mod publish;
pub mod request;
pub mod runner;
pub mod script;
pub mod stage;

pub use deployer::{DeploymentHandle, RemoteDeployer};
pub use error::{Error, Result};
pub use logger::{LogLevel, Logger, StderrLogger};
pub use publish::{PrebuiltPublisher, Publisher};
pub use request::{DeploymentRequest, ServerKind};
pub use runner::{CommandRunner, DeployAction, ScriptRunner, ENV_SEPARATOR};
pub use stage::StagedDeployment;
