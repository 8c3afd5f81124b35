use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error};

use crate::system::EnvSource;

pub const TOKEN_ENV: &str = "GITEA_ADMIN_TOKEN";
pub const TOKEN_FILE_ENV: &str = "GITEA_ADMIN_TOKEN_FILE";
pub const DEFAULT_TOKEN_FILE: &str = "/data/gitea_admin_token";

/// One place an API token may come from. Blank tokens count as absent.
pub trait TokenProvider: Send + Sync {
    fn describe(&self) -> String;
    fn token(&self) -> Option<String>;
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub struct ExplicitToken(pub String);

impl TokenProvider for ExplicitToken {
    fn describe(&self) -> String {
        "explicit token".to_string()
    }

    fn token(&self) -> Option<String> {
        non_blank(&self.0)
    }
}

pub struct EnvToken {
    var: String,
    env: Arc<dyn EnvSource>,
}

impl EnvToken {
    #[must_use]
    pub fn new(var: impl Into<String>, env: Arc<dyn EnvSource>) -> Self {
        Self { var: var.into(), env }
    }
}

impl TokenProvider for EnvToken {
    fn describe(&self) -> String {
        format!("${}", self.var)
    }

    fn token(&self) -> Option<String> {
        self.env.var(&self.var).as_deref().and_then(non_blank)
    }
}

/// A mounted credential file; only the trimmed content is used.
pub struct FileToken {
    path: PathBuf,
}

impl FileToken {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$GITEA_ADMIN_TOKEN_FILE`, else the well-known mount point.
    #[must_use]
    pub fn from_env(env: &dyn EnvSource) -> Self {
        Self::new(
            env.var(TOKEN_FILE_ENV)
                .unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string()),
        )
    }
}

impl TokenProvider for FileToken {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn token(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => non_blank(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                error!(%err, path = %self.path.display(), "failed to read token file");
                None
            }
        }
    }
}

/// Providers consulted in order; the first non-blank token wins.
#[derive(Default)]
pub struct TokenChain {
    providers: Vec<Box<dyn TokenProvider>>,
}

impl TokenChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Explicit token, then `$GITEA_ADMIN_TOKEN`, then the credential file.
    #[must_use]
    pub fn standard(explicit: Option<String>, env: Arc<dyn EnvSource>) -> Self {
        let mut chain = Self::new();
        if let Some(token) = explicit {
            chain = chain.with(ExplicitToken(token));
        }
        let file = FileToken::from_env(env.as_ref());
        chain.with(EnvToken::new(TOKEN_ENV, env)).with(file)
    }

    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        self.providers.iter().find_map(|provider| {
            let token = provider.token()?;
            debug!(source = %provider.describe(), "resolved API token");
            Some(token)
        })
    }
}
