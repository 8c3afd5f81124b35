mod client;
mod gitea;
mod payload;
mod token;

pub use client::{DEFAULT_TIMEOUT, HttpClient, HttpClientBuilder, RequestOptions};
pub use gitea::{API_PREFIX, GiteaClient, GiteaClientBuilder};
pub use payload::{AdoptRepo, NewOrg, NewRepo, NewUser, OrgEdit, RepoEdit, UserEdit};
pub use token::{
    DEFAULT_TOKEN_FILE, EnvToken, ExplicitToken, FileToken, TOKEN_ENV, TOKEN_FILE_ENV, TokenChain,
    TokenProvider,
};
pub use reqwest::Method;
