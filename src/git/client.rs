use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::command::Runner;
use crate::error::Result;
use crate::report::{ArtifactRecorder, InvocationObserver, ReportSink};
use crate::system::{Clock, DefaultClock};
use crate::types::CommandResult;

use super::url::{Protocol, RepoTarget};

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetMode {
    Soft,
    Mixed,
    Hard,
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Soft => "soft",
            Self::Mixed => "mixed",
            Self::Hard => "hard",
        })
    }
}

/// Wrapper around the system `git` binary.
///
/// One method per subcommand, each run in the client's working directory.
/// Use [`GitClient::at`] or [`GitClient::with_target`] to get a client for
/// another directory or repository instead of mutating a shared one.
#[derive(Clone)]
pub struct GitClient {
    runner: Runner,
    target: RepoTarget,
    log_path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct GitClientBuilder {
    target: RepoTarget,
    program: String,
    workdir: Option<PathBuf>,
    artifacts_dir: Option<PathBuf>,
    trace: bool,
    attach_logs: bool,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
    sink: Option<Arc<dyn ReportSink>>,
    observer: Option<Arc<dyn InvocationObserver>>,
    clock: Arc<dyn Clock>,
}

impl Default for GitClientBuilder {
    fn default() -> Self {
        Self {
            target: RepoTarget::default(),
            program: "git".to_string(),
            workdir: None,
            artifacts_dir: None,
            trace: true,
            attach_logs: true,
            timeout: None,
            env: Vec::new(),
            sink: None,
            observer: None,
            clock: Arc::new(DefaultClock),
        }
    }
}

impl GitClientBuilder {
    #[must_use]
    pub fn target(mut self, target: RepoTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.target.protocol = Some(protocol);
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.target.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.target.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn repo(mut self, repo: impl Into<String>) -> Self {
        self.target.repo = Some(repo.into());
        self
    }

    /// Binary to invoke instead of `git` from `PATH`.
    #[must_use]
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    #[must_use]
    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Where the log file goes; defaults to `<workdir>/artifacts`.
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
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the default log-file recorder entirely.
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

    /// Each build claims its own log file.
    #[must_use]
    pub fn build(self) -> GitClient {
        let workdir = self
            .workdir
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let (observer, log_path): (Arc<dyn InvocationObserver>, Option<PathBuf>) =
            match self.observer {
                Some(observer) => (observer, None),
                None => {
                    let artifacts = self
                        .artifacts_dir
                        .unwrap_or_else(|| workdir.join("artifacts"));
                    let recorder = ArtifactRecorder::new(
                        &artifacts,
                        "git-client",
                        self.clock.as_ref(),
                        self.sink,
                        self.attach_logs,
                    );
                    let path = recorder.log_path();
                    (Arc::new(recorder), path)
                }
            };

        let mut runner = Runner::builder(self.program)
            .workdir(&workdir)
            .trace(self.trace)
            .timeout(self.timeout)
            .observer(observer)
            .clock(self.clock);
        for (k, v) in self.env {
            runner = runner.env(k, v);
        }

        debug!(
            target_repo = ?self.target,
            workdir = %workdir.display(),
            log = ?log_path,
            "initialized git client"
        );
        GitClient {
            runner: runner.build(),
            target: self.target,
            log_path,
        }
    }
}

impl GitClient {
    #[must_use]
    pub fn builder() -> GitClientBuilder {
        GitClientBuilder::default()
    }

    #[must_use]
    pub fn target(&self) -> &RepoTarget {
        &self.target
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        self.runner.workdir()
    }

    /// Log file this client appends to, when it owns one.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Same client, run from `dir`.
    #[must_use]
    pub fn at(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            runner: self.runner.at(dir),
            ..self.clone()
        }
    }

    /// Same client, pointed at another repository.
    #[must_use]
    pub fn with_target(&self, target: RepoTarget) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }

    /// Remote URL of the configured target.
    ///
    /// # Errors
    /// See [`RepoTarget::url`].
    pub fn repo_url(&self) -> Result<String> {
        self.target.url()
    }

    /// Run arbitrary `git` arguments.
    ///
    /// # Errors
    /// Launch failures and timeouts; see [`Runner::run`].
    pub fn run<S: AsRef<str>>(
        &self,
        args: &[S],
        workdir: Option<&Path>,
        env: &[(&str, &str)],
    ) -> Result<CommandResult> {
        self.runner.run(args, workdir, env)
    }

    fn git<S: AsRef<str>>(&self, args: &[S]) -> Result<CommandResult> {
        self.runner.run(args, None, &[])
    }

    /// Clone the configured target, optionally into `target_dir`.
    ///
    /// # Errors
    /// [`crate::Error::InvalidConfig`] before anything runs when the target
    /// is incomplete; otherwise as [`GitClient::run`].
    pub fn clone_repo(&self, target_dir: Option<&str>) -> Result<CommandResult> {
        let url = self.target.url()?;
        self.clone_url(&url, target_dir)
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn clone_url(&self, url: &str, target_dir: Option<&str>) -> Result<CommandResult> {
        let mut args = vec!["clone", url];
        args.extend(target_dir);
        self.git(&args)
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn init(&self) -> Result<CommandResult> {
        self.git(&["init"])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn add(&self, path: &str) -> Result<CommandResult> {
        self.git(&["add", path])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn commit(&self, message: &str) -> Result<CommandResult> {
        self.git(&["commit", "-m", message])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn push(&self, remote: &str, branch: &str) -> Result<CommandResult> {
        self.git(&["push", remote, branch])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn pull(&self, remote: &str, branch: &str) -> Result<CommandResult> {
        self.git(&["pull", remote, branch])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn fetch(&self, remote: &str) -> Result<CommandResult> {
        self.git(&["fetch", remote])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn status(&self) -> Result<CommandResult> {
        self.git(&["status"])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn checkout(&self, branch: &str) -> Result<CommandResult> {
        self.git(&["checkout", branch])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn branch(&self, name: &str) -> Result<CommandResult> {
        self.git(&["branch", name])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn merge(&self, branch: &str) -> Result<CommandResult> {
        self.git(&["merge", branch])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn rebase(&self, branch: &str) -> Result<CommandResult> {
        self.git(&["rebase", branch])
    }

    /// Lightweight tag, or annotated when `message` is given.
    ///
    /// # Errors
    /// As [`GitClient::run`].
    pub fn tag(&self, name: &str, message: Option<&str>) -> Result<CommandResult> {
        match message {
            Some(m) => self.git(&["tag", "-a", name, "-m", m]),
            None => self.git(&["tag", name]),
        }
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn list_tags(&self) -> Result<CommandResult> {
        self.git(&["tag", "--list"])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn delete_tag(&self, name: &str) -> Result<CommandResult> {
        self.git(&["tag", "-d", name])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn remote_add(&self, name: &str, url: &str) -> Result<CommandResult> {
        self.git(&["remote", "add", name, url])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn remote_remove(&self, name: &str) -> Result<CommandResult> {
        self.git(&["remote", "remove", name])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn remote_list(&self) -> Result<CommandResult> {
        self.git(&["remote", "-v"])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn config_set(&self, key: &str, value: &str) -> Result<CommandResult> {
        self.git(&["config", key, value])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn config_get(&self, key: &str) -> Result<CommandResult> {
        self.git(&["config", "--get", key])
    }

    /// Last `n` commits, one line each.
    ///
    /// # Errors
    /// As [`GitClient::run`].
    pub fn log(&self, n: usize) -> Result<CommandResult> {
        self.git(&["log".to_string(), format!("-n{n}"), "--oneline".to_string()])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn diff(&self, from: &str, to: &str) -> Result<CommandResult> {
        self.git(&["diff".to_string(), format!("{from}..{to}")])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn reset(&self, mode: ResetMode, commit: &str) -> Result<CommandResult> {
        self.git(&["reset".to_string(), format!("--{mode}"), commit.to_string()])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn stash_save(&self, message: Option<&str>) -> Result<CommandResult> {
        let mut args = vec!["stash", "save"];
        args.extend(message.filter(|m| !m.is_empty()));
        self.git(&args)
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn stash_pop(&self, index: usize) -> Result<CommandResult> {
        self.git(&["stash".to_string(), "pop".to_string(), format!("stash@{{{index}}}")])
    }

    /// # Errors
    /// As [`GitClient::run`].
    pub fn stash_list(&self) -> Result<CommandResult> {
        self.git(&["stash", "list"])
    }
}
