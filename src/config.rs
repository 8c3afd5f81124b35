use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::git::{GitClient, GitClientBuilder, Protocol, RepoTarget};
use crate::http::{GiteaClient, GiteaClientBuilder};
use crate::report::ReportSink;
use crate::ssh::{SshClient, SshClientBuilder};
use crate::system::EnvSource;

pub const DEFAULT_CONFIG_FILE: &str = "gitguard.toml";
pub const DEFAULT_BASE_URL: &str = "http://gitea:3000";
pub const BASE_URL_ENV: &str = "GITEA_BASE_URL";
pub const HOST_ENV: &str = "GITEA_HOST";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub git: GitSettings,
    pub ssh: SshSettings,
    pub api: ApiSettings,
    /// Shared artifacts directory; each client otherwise picks its own.
    #[serde(rename = "artifacts-dir")]
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GitSettings {
    pub protocol: String,
    pub host: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub program: String,
    pub workdir: Option<PathBuf>,
    pub trace: bool,
    pub attach_logs: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Http.to_string(),
            host: None,
            owner: None,
            repo: None,
            program: "git".to_string(),
            workdir: None,
            trace: true,
            attach_logs: true,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SshSettings {
    pub host: Option<String>,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    pub program: String,
    pub trace: bool,
    pub attach_logs: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            host: None,
            user: "git".to_string(),
            port: 22,
            identity_file: None,
            program: "ssh".to_string(),
            trace: false,
            attach_logs: true,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub attach_logs: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: 10,
            attach_logs: true,
        }
    }
}

/// Read and parse a settings file.
///
/// # Errors
/// [`Error::ConfigRead`] or [`Error::ConfigParse`].
pub fn load_settings(path: &Path) -> Result<Settings> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// An explicit path must exist; otherwise `./gitguard.toml` is used when
/// present and built-in defaults when not.
///
/// # Errors
/// See [`load_settings`].
pub fn load_or_default(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => load_settings(path),
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.is_file() {
                load_settings(local)
            } else {
                debug!("no settings file; using defaults");
                Ok(Settings::default())
            }
        }
    }
}

impl Settings {
    /// Overlay `GITEA_BASE_URL` and `GITEA_HOST`. Tokens are resolved later
    /// by the API client's credential chain.
    #[must_use]
    pub fn with_env(mut self, env: &dyn EnvSource) -> Self {
        if let Some(url) = env.var(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(host) = env.var(HOST_ENV).filter(|v| !v.trim().is_empty()) {
            self.git.host = Some(host.clone());
            self.ssh.host = Some(host);
        }
        self
    }

    /// # Errors
    /// [`Error::UnsupportedProtocol`] for an unknown `git.protocol`.
    pub fn protocol(&self) -> Result<Protocol> {
        self.git.protocol.parse()
    }

    /// # Errors
    /// See [`Settings::protocol`].
    pub fn target(&self) -> Result<RepoTarget> {
        Ok(RepoTarget {
            protocol: Some(self.protocol()?),
            host: self.git.host.clone(),
            owner: self.git.owner.clone(),
            repo: self.git.repo.clone(),
        })
    }

    /// # Errors
    /// See [`Settings::protocol`].
    pub fn git_builder(&self) -> Result<GitClientBuilder> {
        let mut builder = GitClient::builder()
            .target(self.target()?)
            .program(self.git.program.clone())
            .trace(self.git.trace)
            .attach_logs(self.git.attach_logs)
            .timeout(self.git.timeout_secs.map(Duration::from_secs));
        if let Some(dir) = &self.git.workdir {
            builder = builder.workdir(dir.clone());
        }
        if let Some(dir) = &self.artifacts_dir {
            builder = builder.artifacts_dir(dir.clone());
        }
        Ok(builder)
    }

    /// # Errors
    /// [`Error::InvalidConfig`] when no SSH host is configured.
    pub fn ssh_builder(&self) -> Result<SshClientBuilder> {
        let host = self
            .ssh
            .host
            .clone()
            .or_else(|| self.git.host.clone())
            .ok_or_else(|| Error::InvalidConfig("ssh host is not configured".to_string()))?;
        let mut builder = SshClient::builder(host)
            .user(self.ssh.user.clone())
            .port(self.ssh.port)
            .program(self.ssh.program.clone())
            .trace(self.ssh.trace)
            .attach_logs(self.ssh.attach_logs)
            .timeout(self.ssh.timeout_secs.map(Duration::from_secs));
        if let Some(key) = &self.ssh.identity_file {
            builder = builder.identity_file(key.clone());
        }
        if let Some(dir) = &self.artifacts_dir {
            builder = builder.artifacts_dir(dir.clone());
        }
        Ok(builder)
    }

    /// # Errors
    /// [`Error::InvalidConfig`] for a zero timeout.
    pub fn gitea_builder(
        &self,
        env: Arc<dyn EnvSource>,
        sink: Option<Arc<dyn ReportSink>>,
    ) -> Result<GiteaClientBuilder> {
        if self.api.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "api.timeout-secs must be greater than zero".to_string(),
            ));
        }
        let mut builder = GiteaClient::builder(self.api.base_url.clone())
            .env(env)
            .timeout(Duration::from_secs(self.api.timeout_secs))
            .attach_logs(self.api.attach_logs);
        if let Some(token) = &self.api.token {
            builder = builder.token(token.clone());
        }
        if let Some(sink) = sink {
            builder = builder.sink(sink);
        }
        Ok(builder)
    }
}
