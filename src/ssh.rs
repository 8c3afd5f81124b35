use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::command::Runner;
use crate::error::{Error, Result};
use crate::report::{ArtifactRecorder, InvocationObserver, ReportSink};
use crate::system::{Clock, DefaultClock};
use crate::types::CommandResult;

/// Runs commands on a remote host through the system `ssh` binary.
///
/// Host keys are never verified; this is meant for disposable test hosts.
#[derive(Clone)]
pub struct SshClient {
    runner: Runner,
    host: String,
    user: String,
    port: u16,
    identity_file: Option<PathBuf>,
    log_path: Option<PathBuf>,
}

pub struct SshClientBuilder {
    host: String,
    user: String,
    port: u16,
    identity_file: Option<PathBuf>,
    program: String,
    artifacts_dir: Option<PathBuf>,
    trace: bool,
    attach_logs: bool,
    timeout: Option<Duration>,
    sink: Option<Arc<dyn ReportSink>>,
    observer: Option<Arc<dyn InvocationObserver>>,
    clock: Arc<dyn Clock>,
}

impl SshClientBuilder {
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Where the log file goes; defaults to `./artifacts`.
    #[must_use]
    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    #[must_use]
    pub fn attach_logs(mut self, enabled: bool) -> Self {
        self.attach_logs = enabled;
        self
    }

    #[must_use]
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn build(self) -> SshClient {
        let (observer, log_path): (Arc<dyn InvocationObserver>, Option<PathBuf>) =
            match self.observer {
                Some(observer) => (observer, None),
                None => {
                    let artifacts = self.artifacts_dir.unwrap_or_else(|| {
                        std::env::current_dir()
                            .unwrap_or_else(|_| PathBuf::from("."))
                            .join("artifacts")
                    });
                    let recorder = ArtifactRecorder::new(
                        &artifacts,
                        "ssh-client",
                        self.clock.as_ref(),
                        self.sink,
                        self.attach_logs,
                    );
                    let path = recorder.log_path();
                    (Arc::new(recorder), path)
                }
            };
        SshClient {
            runner: Runner::builder(self.program)
                .trace(self.trace)
                .timeout(self.timeout)
                .observer(observer)
                .clock(self.clock)
                .build(),
            host: self.host,
            user: self.user,
            port: self.port,
            identity_file: self.identity_file,
            log_path,
        }
    }
}

impl SshClient {
    /// Defaults: user `git`, port 22, no identity file, trace off.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SshClientBuilder {
        SshClientBuilder {
            host: host.into(),
            user: "git".to_string(),
            port: 22,
            identity_file: None,
            program: "ssh".to_string(),
            artifacts_dir: None,
            trace: false,
            attach_logs: true,
            timeout: None,
            sink: None,
            observer: None,
            clock: Arc::new(DefaultClock),
        }
    }

    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Arguments passed to `ssh` for `remote_cmd`.
    #[must_use]
    pub fn command_args(&self, remote_cmd: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
        ];
        if let Some(key) = &self.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(format!("{}@{}", self.user, self.host));
        args.push(remote_cmd.to_string());
        args
    }

    /// Run `remote_cmd` and hand back the result whatever the exit status.
    ///
    /// # Errors
    /// Launch failures and timeouts.
    pub fn run(&self, remote_cmd: &str) -> Result<CommandResult> {
        self.runner.run(&self.command_args(remote_cmd), None, &[])
    }

    /// Like [`SshClient::run`], but a non-zero exit is an error too.
    ///
    /// # Errors
    /// [`Error::RemoteCommand`] for a non-zero exit, plus everything
    /// [`SshClient::run`] returns.
    pub fn run_checked(&self, remote_cmd: &str) -> Result<CommandResult> {
        let result = self.run(remote_cmd)?;
        if result.ok() {
            Ok(result)
        } else {
            Err(Error::RemoteCommand {
                code: result.code(),
                stdout: result.stdout().to_string(),
                stderr: result.stderr().to_string(),
            })
        }
    }
}
