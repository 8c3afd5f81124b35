use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Operational and configuration failures.
///
/// A command that exits non-zero or a request answered with a non-2xx status
/// is not an error; those are reported through [`crate::CommandResult`] and
/// [`crate::HttpResult`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported protocol '{0}'")]
    UnsupportedProtocol(String),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {limit:?}")]
    Timeout {
        program: String,
        limit: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("remote command failed with status {code}: {stderr}")]
    RemoteCommand {
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("{method} {url} failed: {source}")]
    Http {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} timed out")]
    HttpTimeout { method: String, url: String },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to start worker pool: {source}")]
    WorkerPool {
        #[source]
        source: rayon::ThreadPoolBuildError,
    },

    #[error("failed to scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True for a command or request that hit its deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::HttpTimeout { .. })
    }
}
