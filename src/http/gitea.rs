use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;
use crate::report::ReportSink;
use crate::system::{EnvSource, ProcessEnv};
use crate::types::HttpResult;

use super::client::{DEFAULT_TIMEOUT, HttpClient, RequestOptions};
use super::payload::{AdoptRepo, NewOrg, NewRepo, NewUser, OrgEdit, RepoEdit, UserEdit};
use super::token::TokenChain;

pub const API_PREFIX: &str = "/api/v1";

/// Gitea REST API, one request per method.
///
/// Every method returns the [`HttpResult`] untouched, so a 404 or 422 is
/// something the caller asserts on rather than an error.
#[derive(Clone)]
pub struct GiteaClient {
    http: HttpClient,
    token: Option<String>,
}

pub struct GiteaClientBuilder {
    base_url: String,
    token: Option<String>,
    tokens: Option<TokenChain>,
    env: Arc<dyn EnvSource>,
    timeout: Duration,
    sink: Option<Arc<dyn ReportSink>>,
    attach: bool,
}

impl GiteaClientBuilder {
    /// Takes precedence over every other credential source.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Replace the standard credential lookup entirely.
    #[must_use]
    pub fn tokens(mut self, chain: TokenChain) -> Self {
        self.tokens = Some(chain);
        self
    }

    #[must_use]
    pub fn env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn attach_logs(mut self, enabled: bool) -> Self {
        self.attach = enabled;
        self
    }

    /// # Errors
    /// See [`super::HttpClientBuilder::build`].
    pub fn build(self) -> Result<GiteaClient> {
        let api_url = format!("{}{API_PREFIX}", self.base_url.trim_end_matches('/'));
        let chain = self
            .tokens
            .unwrap_or_else(|| TokenChain::standard(self.token, self.env));
        let token = chain.resolve();
        if token.is_none() {
            warn!(
                url = %api_url,
                "no API token found (GITEA_ADMIN_TOKEN or token file); requests go out unauthenticated"
            );
        }

        let mut http = HttpClient::builder(api_url)
            .timeout(self.timeout)
            .attach_logs(self.attach);
        if let Some(sink) = self.sink {
            http = http.sink(sink);
        }
        Ok(GiteaClient {
            http: http.build()?,
            token,
        })
    }
}

impl GiteaClient {
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> GiteaClientBuilder {
        GiteaClientBuilder {
            base_url: base_url.into(),
            token: None,
            tokens: None,
            env: Arc::new(ProcessEnv),
            timeout: DEFAULT_TIMEOUT,
            sink: None,
            attach: true,
        }
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        self.http.base_url()
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    fn auth(&self) -> RequestOptions {
        match &self.token {
            Some(token) => RequestOptions::new().header("Authorization", format!("token {token}")),
            None => RequestOptions::new(),
        }
    }

    fn get(&self, path: &str) -> Result<HttpResult> {
        self.http.get(path, &self.auth())
    }

    fn delete(&self, path: &str) -> Result<HttpResult> {
        self.http.delete(path, &self.auth())
    }

    fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<HttpResult> {
        self.http.post(path, &self.auth().json(body))
    }

    fn patch<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<HttpResult> {
        self.http.patch(path, &self.auth().json(body))
    }

    // health

    /// `GET /api/v1/`: any answer means the service is up.
    ///
    /// # Errors
    /// Transport failures only; see [`HttpClient::request`].
    pub fn health_check(&self) -> Result<HttpResult> {
        self.get("")
    }

    /// # Errors
    /// Transport failures only.
    pub fn version(&self) -> Result<HttpResult> {
        self.get("version")
    }

    // users

    /// # Errors
    /// Transport failures only.
    pub fn get_user(&self, username: &str) -> Result<HttpResult> {
        self.get(&format!("users/{username}"))
    }

    /// # Errors
    /// Transport failures only.
    pub fn list_users(&self) -> Result<HttpResult> {
        self.get("admin/users")
    }

    /// # Errors
    /// Transport failures only.
    pub fn create_user(&self, user: &NewUser) -> Result<HttpResult> {
        self.post("admin/users", user)
    }

    /// # Errors
    /// Transport failures only.
    pub fn edit_user(&self, username: &str, edit: &UserEdit) -> Result<HttpResult> {
        self.patch(&format!("admin/users/{username}"), edit)
    }

    /// # Errors
    /// Transport failures only.
    pub fn delete_user(&self, username: &str) -> Result<HttpResult> {
        self.delete(&format!("admin/users/{username}"))
    }

    // organizations

    /// Organizations of the authenticated user.
    ///
    /// # Errors
    /// Transport failures only.
    pub fn list_orgs(&self) -> Result<HttpResult> {
        self.get("user/orgs")
    }

    /// # Errors
    /// Transport failures only.
    pub fn create_org(&self, name: &str, description: &str) -> Result<HttpResult> {
        self.post("orgs", &NewOrg::new(name, description))
    }

    /// Create an organization owned by `owner`.
    ///
    /// # Errors
    /// Transport failures only.
    pub fn admin_create_org(&self, owner: &str, name: &str, description: &str) -> Result<HttpResult> {
        self.post(&format!("admin/users/{owner}/orgs"), &NewOrg::new(name, description))
    }

    /// # Errors
    /// Transport failures only.
    pub fn get_org(&self, name: &str) -> Result<HttpResult> {
        self.get(&format!("orgs/{name}"))
    }

    /// # Errors
    /// Transport failures only.
    pub fn edit_org(&self, name: &str, edit: &OrgEdit) -> Result<HttpResult> {
        self.patch(&format!("orgs/{name}"), edit)
    }

    /// # Errors
    /// Transport failures only.
    pub fn delete_org(&self, name: &str) -> Result<HttpResult> {
        self.delete(&format!("orgs/{name}"))
    }

    // repositories

    /// Repositories of `username`, or of the authenticated user for `None`.
    ///
    /// # Errors
    /// Transport failures only.
    pub fn list_repos(&self, username: Option<&str>) -> Result<HttpResult> {
        match username {
            Some(user) => self.list_user_repos(user),
            None => self.get("user/repos"),
        }
    }

    /// # Errors
    /// Transport failures only.
    pub fn list_user_repos(&self, username: &str) -> Result<HttpResult> {
        self.get(&format!("users/{username}/repos"))
    }

    /// Create a repository for the authenticated user.
    ///
    /// # Errors
    /// Transport failures only.
    pub fn create_repo(&self, repo: &NewRepo) -> Result<HttpResult> {
        self.post("user/repos", repo)
    }

    /// # Errors
    /// Transport failures only.
    pub fn admin_create_repo(&self, username: &str, repo: &NewRepo) -> Result<HttpResult> {
        self.post(&format!("admin/users/{username}/repos"), repo)
    }

    /// # Errors
    /// Transport failures only.
    pub fn get_repo(&self, owner: &str, repo: &str) -> Result<HttpResult> {
        self.get(&format!("repos/{owner}/{repo}"))
    }

    /// # Errors
    /// Transport failures only.
    pub fn edit_repo(&self, owner: &str, repo: &str, edit: &RepoEdit) -> Result<HttpResult> {
        self.patch(&format!("repos/{owner}/{repo}"), edit)
    }

    /// # Errors
    /// Transport failures only.
    pub fn rename_repo(&self, owner: &str, repo: &str, new_name: &str) -> Result<HttpResult> {
        let edit = RepoEdit {
            name: Some(new_name.to_string()),
            ..RepoEdit::default()
        };
        self.edit_repo(owner, repo, &edit)
    }

    /// # Errors
    /// Transport failures only.
    pub fn delete_repo(&self, owner: &str, repo: &str) -> Result<HttpResult> {
        self.delete(&format!("repos/{owner}/{repo}"))
    }

    // unadopted repositories

    /// # Errors
    /// Transport failures only.
    pub fn list_unadopted_repos(&self) -> Result<HttpResult> {
        self.get("admin/unadopted")
    }

    /// # Errors
    /// Transport failures only.
    pub fn adopt_unadopted_repo(&self, owner: &str, repo: &str) -> Result<HttpResult> {
        let body = AdoptRepo {
            repo_name: repo.to_string(),
            owner: owner.to_string(),
        };
        self.post("admin/unadopted", &body)
    }

    /// # Errors
    /// Transport failures only.
    pub fn delete_unadopted_repo(&self, owner: &str, repo: &str) -> Result<HttpResult> {
        self.delete(&format!("admin/unadopted/{owner}/{repo}"))
    }
}
