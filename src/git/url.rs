use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Git,
    Ssh,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Self::Http, Self::Https, Self::Git, Self::Ssh];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Git => "git",
            Self::Ssh => "ssh",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "git" => Ok(Self::Git),
            "ssh" => Ok(Self::Ssh),
            _ => Err(Error::UnsupportedProtocol(s.to_string())),
        }
    }
}

/// Coordinates of one repository on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RepoTarget {
    pub protocol: Option<Protocol>,
    pub host: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
}

impl RepoTarget {
    #[must_use]
    pub fn new(protocol: Protocol, host: &str, owner: &str, repo: &str) -> Self {
        Self {
            protocol: Some(protocol),
            host: Some(host.to_string()),
            owner: Some(owner.to_string()),
            repo: Some(repo.to_string()),
        }
    }

    /// Parse the protocol from text, as found in config files and CLI flags.
    ///
    /// # Errors
    /// [`Error::UnsupportedProtocol`] for anything outside [`Protocol::ALL`].
    pub fn parse(protocol: &str, host: &str, owner: &str, repo: &str) -> Result<Self> {
        Ok(Self::new(protocol.parse()?, host, owner, repo))
    }

    #[must_use]
    pub fn with_protocol(&self, protocol: Protocol) -> Self {
        Self {
            protocol: Some(protocol),
            ..self.clone()
        }
    }

    /// Canonical remote URL; a missing protocol means `http`.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] when host, owner or repository is missing.
    pub fn url(&self) -> Result<String> {
        repo_url(
            self.protocol.unwrap_or(Protocol::Http),
            self.host.as_deref(),
            self.owner.as_deref(),
            self.repo.as_deref(),
        )
    }
}

/// Build the remote URL for `owner/repo` on `host`.
///
/// # Errors
/// [`Error::InvalidConfig`] when any coordinate is missing or blank.
pub fn repo_url(
    protocol: Protocol,
    host: Option<&str>,
    owner: Option<&str>,
    repo: Option<&str>,
) -> Result<String> {
    fn present(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }
    let (Some(host), Some(owner), Some(repo)) = (present(host), present(owner), present(repo)) else {
        return Err(Error::InvalidConfig(
            "host/owner/repo must be provided to build repository URL".to_string(),
        ));
    };
    let path = format!("{owner}/{repo}.git");
    Ok(match protocol {
        Protocol::Http | Protocol::Https => format!("{protocol}://{host}/{path}"),
        Protocol::Git => format!("git://{host}/{path}"),
        Protocol::Ssh => format!("git@{host}:{path}"),
    })
}
