//! Remote command execution via the control script.
//!
//! Start and stop share one routine: invoke the control script with the
//! deployment parameters, stream its output to the logger, and judge
//! the outcome by exit code. The wait is bounded; on expiry the script
//! process is killed before the timeout is reported.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::logger::{LogLevel, Logger};
use crate::request::DeploymentRequest;
use crate::script;

/// Separator between serialized `KEY=VALUE` environment pairs.
///
/// Reserved: serialization rejects keys and values containing it, since
/// the joined representation would otherwise be ambiguous.
pub const ENV_SEPARATOR: &str = "|;|";

/// Hard ceiling on one control-script invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Start,
    Stop,
}

impl DeployAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DeployAction::Start => "start",
            DeployAction::Stop => "stop",
        }
    }
}

/// Seam for issuing start/stop commands against the target host.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        action: DeployAction,
        request: &DeploymentRequest,
        remote_executable: &Path,
    ) -> Result<()>;
}

/// Join the environment mapping into the control script's single-string
/// transport format, preserving pair order.
pub fn serialize_environment(environment: &[(String, String)]) -> Result<String> {
    for (key, value) in environment {
        if key.contains(ENV_SEPARATOR) || value.contains(ENV_SEPARATOR) {
            return Err(Error::config(
                "environment",
                format!("Variable '{}' contains the reserved separator '{}'", key, ENV_SEPARATOR),
            ));
        }
    }

    Ok(environment
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(ENV_SEPARATOR))
}

/// Runs the control script as a child process, forwarding its output
/// line-by-line to the logger while blocking until exit or timeout.
pub struct ScriptRunner {
    script_path: PathBuf,
    logger: Arc<dyn Logger>,
    timeout: Duration,
}

impl ScriptRunner {
    pub fn new(script_path: PathBuf, logger: Arc<dyn Logger>) -> Self {
        Self {
            script_path,
            logger,
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Runner backed by the bundled control script, installing it if
    /// this is the first use in the process.
    pub fn with_default_script(logger: Arc<dyn Logger>) -> Result<Self> {
        Ok(Self::new(script::install_default()?, logger))
    }

    /// Override the wait ceiling. Mainly useful for harnesses that know
    /// their scripts finish quickly.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn spawn(
        &self,
        action: DeployAction,
        request: &DeploymentRequest,
        remote_executable: &Path,
    ) -> Result<Child> {
        let environment = serialize_environment(&request.environment)?;

        let child = Command::new(&self.script_path)
            .arg("--host")
            .arg(&request.host)
            .arg("--user")
            .arg(&request.account_name)
            .arg("--secret")
            .arg(&request.account_secret)
            .arg("--exe-path")
            .arg(remote_executable)
            .arg("--server")
            .arg(request.server.as_str())
            .arg("--action")
            .arg(action.as_str())
            .arg("--base-url")
            .arg(&request.base_url)
            .arg("--environment")
            .arg(environment)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        Ok(child)
    }
}

impl CommandRunner for ScriptRunner {
    fn run(
        &self,
        action: DeployAction,
        request: &DeploymentRequest,
        remote_executable: &Path,
    ) -> Result<()> {
        let host = &request.host;
        self.logger.info(&format!(
            "[{}] Running control script ({}) for {}",
            host,
            action.as_str(),
            remote_executable.display()
        ));

        let mut child = self.spawn(action, request, remote_executable)?;

        let stderr_lines = Arc::new(Mutex::new(Vec::new()));
        let stdout_task = forward_lines(
            child.stdout.take(),
            Arc::clone(&self.logger),
            LogLevel::Info,
            host.clone(),
            None,
        );
        let stderr_task = forward_lines(
            child.stderr.take(),
            Arc::clone(&self.logger),
            LogLevel::Warning,
            host.clone(),
            Some(Arc::clone(&stderr_lines)),
        );

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => {
                join_forwarders(stdout_task, stderr_task);
                status
            }
            Err(err) => {
                // Child state is unknown; reap it before reporting.
                let _ = child.kill();
                let _ = child.wait();
                join_forwarders(stdout_task, stderr_task);
                return Err(err);
            }
            Ok(None) => {
                // Deadline expired. Kill the script so it cannot linger,
                // then report the timeout; the remote process may still
                // be running and is dealt with by a later stop.
                let _ = child.kill();
                let _ = child.wait();
                join_forwarders(stdout_task, stderr_task);
                return Err(Error::Timeout {
                    host: host.clone(),
                    action: action.as_str().to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            let detail = stderr_lines
                .lock()
                .map(|lines| lines.last().cloned())
                .ok()
                .flatten()
                .unwrap_or_else(|| "control script reported failure".to_string());
            return Err(Error::Execution {
                host: host.clone(),
                action: action.as_str().to_string(),
                exit_code,
                detail,
            });
        }

        Ok(())
    }
}

/// Stream lines from a child pipe to the logger, tagged with the host.
fn forward_lines<R: Read + Send + 'static>(
    pipe: Option<R>,
    logger: Arc<dyn Logger>,
    level: LogLevel,
    host: String,
    capture: Option<Arc<Mutex<Vec<String>>>>,
) -> Option<JoinHandle<()>> {
    let pipe = pipe?;
    Some(thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            logger.log(level, &format!("[{}] {}", host, line), None);
            if let Some(ref lines) = capture {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
        }
    }))
}

fn join_forwarders(stdout_task: Option<JoinHandle<()>>, stderr_task: Option<JoinHandle<()>>) {
    if let Some(task) = stdout_task {
        let _ = task.join();
    }
    if let Some(task) = stderr_task {
        let _ = task.join();
    }
}

/// Poll for exit until the deadline. Returns `Ok(None)` when it
/// expires; wait errors propagate rather than counting as a timeout.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ServerKind;
    use std::fs;
    use std::path::PathBuf;

    struct RecordingLogger(Mutex<Vec<(LogLevel, String)>>);

    impl RecordingLogger {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }

        fn lines(&self) -> Vec<(LogLevel, String)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: LogLevel, message: &str, _error: Option<&Error>) {
            self.0.lock().unwrap().push((level, message.to_string()));
        }
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            server: ServerKind::Kestrel,
            host: "target-1".to_string(),
            account_name: "deploy".to_string(),
            account_secret: "secret".to_string(),
            staging_root: PathBuf::from("/tmp/staging"),
            executable_relative_path: "app".to_string(),
            base_url: "http://target-1:5000".to_string(),
            environment: vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "2".to_string()),
            ],
            published_root: PathBuf::from("/tmp/publish"),
        }
    }

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("script.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn environment_serializes_in_given_order() {
        let env = vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ];
        assert_eq!(serialize_environment(&env).unwrap(), "A=1|;|B=2");
    }

    #[test]
    fn environment_rejects_reserved_separator() {
        let env = vec![("BAD".to_string(), "x|;|y".to_string())];
        let err = serialize_environment(&env).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn zero_exit_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 0");
        let runner = ScriptRunner::new(script, RecordingLogger::new());
        let result = runner.run(DeployAction::Start, &request(), Path::new("/srv/app"));
        assert!(result.is_ok());
    }

    #[test]
    fn nonzero_exit_fails_naming_host_and_action() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo boom >&2\nexit 1");
        let runner = ScriptRunner::new(script, RecordingLogger::new());
        let err = runner
            .run(DeployAction::Start, &request(), Path::new("/srv/app"))
            .unwrap_err();
        match err {
            Error::Execution {
                host,
                action,
                exit_code,
                detail,
            } => {
                assert_eq!(host, "target-1");
                assert_eq!(action, "start");
                assert_eq!(exit_code, 1);
                assert_eq!(detail, "boom");
            }
            other => panic!("expected Execution error, got {other:?}"),
        }
    }

    #[test]
    fn output_lines_are_forwarded_with_levels() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo out-line\necho err-line >&2");
        let logger = RecordingLogger::new();
        let runner = ScriptRunner::new(script, Arc::clone(&logger) as Arc<dyn Logger>);
        runner
            .run(DeployAction::Stop, &request(), Path::new("/srv/app"))
            .unwrap();

        let lines = logger.lines();
        assert!(lines
            .iter()
            .any(|(level, msg)| *level == LogLevel::Info && msg == "[target-1] out-line"));
        assert!(lines
            .iter()
            .any(|(level, msg)| *level == LogLevel::Warning && msg == "[target-1] err-line"));
    }

    #[test]
    fn wait_distinguishes_exit_from_deadline_expiry() {
        let mut quick = Command::new("sh").arg("-c").arg("exit 0").spawn().unwrap();
        let status = wait_with_deadline(&mut quick, Duration::from_secs(5)).unwrap();
        assert!(status.is_some());

        let mut slow = Command::new("sh").arg("-c").arg("sleep 30").spawn().unwrap();
        let status = wait_with_deadline(&mut slow, Duration::from_millis(100)).unwrap();
        assert!(status.is_none());
        let _ = slow.kill();
        let _ = slow.wait();
    }

    #[test]
    fn deadline_expiry_kills_script_and_reports_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "sleep 30");
        let runner = ScriptRunner::new(script, RecordingLogger::new())
            .timeout(Duration::from_millis(200));
        let err = runner
            .run(DeployAction::Start, &request(), Path::new("/srv/app"))
            .unwrap_err();
        assert_eq!(err.code(), "EXECUTION_TIMEOUT");
    }

    #[test]
    fn script_receives_serialized_environment() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("args.txt");
        let script = write_script(
            dir.path(),
            &format!("printf '%s\\n' \"$@\" > {}", out.display()),
        );
        let runner = ScriptRunner::new(script, RecordingLogger::new());
        runner
            .run(DeployAction::Start, &request(), Path::new("/srv/app"))
            .unwrap();

        let args = fs::read_to_string(out).unwrap();
        assert!(args.contains("A=1|;|B=2"));
        assert!(args.contains("--action\nstart"));
        assert!(args.contains("target-1"));
    }
}
