mod client;
mod url;

pub use client::{DEFAULT_BRANCH, DEFAULT_REMOTE, GitClient, GitClientBuilder, ResetMode};
pub use url::{Protocol, RepoTarget, repo_url};
