#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Instrumented clients for exercising a self-hosted Git service: `git`,
//! `ssh` and its REST API, each leaving a log behind for the test report.

mod error;
mod types;
mod system;
mod command;
mod report;
mod git;
mod ssh;
mod http;
mod config;
mod matrix;
mod artifacts;
pub mod output;

pub use error::{Error, Result};
pub use types::{CommandResult, HttpResult};
pub use system::{Clock, DefaultClock, EnvSource, MapEnv, ProcessEnv};
pub use command::{CommandLog, LogRecord, Runner, RunnerBuilder, TRACE_DEFAULTS, TRACE_MARKERS, shell_join};
pub use report::{
    ArtifactRecorder, Attachment, DirectorySink, InvocationObserver, MemorySink, NoopObserver,
    NullSink, ReportSink,
};
pub use git::{
    DEFAULT_BRANCH, DEFAULT_REMOTE, GitClient, GitClientBuilder, Protocol, RepoTarget, ResetMode,
    repo_url,
};
pub use ssh::{SshClient, SshClientBuilder};
pub use http::{
    API_PREFIX, AdoptRepo, DEFAULT_TIMEOUT, DEFAULT_TOKEN_FILE, EnvToken, ExplicitToken, FileToken,
    GiteaClient, GiteaClientBuilder, HttpClient, HttpClientBuilder, Method, NewOrg, NewRepo,
    NewUser, OrgEdit, RepoEdit, RequestOptions, TOKEN_ENV, TOKEN_FILE_ENV, TokenChain,
    TokenProvider, UserEdit,
};
pub use config::{
    ApiSettings, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_CONFIG_FILE, GitSettings, HOST_ENV,
    Settings, SshSettings, load_or_default, load_settings,
};
pub use matrix::{MatrixOutcome, clone_matrix};
pub use artifacts::{LogFile, list_logs};
