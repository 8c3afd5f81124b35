use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::report::ReportSink;
use crate::types::HttpResult;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Headers, query parameters and body for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    json: Option<serde_json::Value>,
    body: Option<String>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// JSON body; replaces any raw body. A value that cannot be serialized
    /// is logged and leaves the options unchanged.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => {
                self.json = Some(value);
                self.body = None;
            }
            Err(err) => error!(error = %err, "request body is not serializable as JSON; dropped"),
        }
        self
    }

    /// Raw text body; replaces any JSON body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.json = None;
        self
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }
}

/// Rendering used for the `http-request` attachment. Credentials are masked.
impl fmt::Display for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("authorization") {
                writeln!(f, "{name}: <redacted>")?;
            } else {
                writeln!(f, "{name}: {value}")?;
            }
        }
        if !self.query.is_empty() {
            let pairs: Vec<String> = self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            writeln!(f, "query: {}", pairs.join("&"))?;
        }
        if let Some(json) = &self.json {
            writeln!(f, "json: {json}")?;
        }
        if let Some(body) = &self.body {
            writeln!(f, "body: {body}")?;
        }
        Ok(())
    }
}

/// Single-shot HTTP requests against one base URL.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
    timeout: Duration,
    sink: Option<Arc<dyn ReportSink>>,
    attach: bool,
}

pub struct HttpClientBuilder {
    base_url: String,
    timeout: Duration,
    sink: Option<Arc<dyn ReportSink>>,
    attach: bool,
}

impl HttpClientBuilder {
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
    /// [`Error::InvalidConfig`] when the underlying HTTP stack cannot be
    /// initialised.
    pub fn build(self) -> Result<HttpClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("gitguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            client,
            timeout: self.timeout,
            sink: self.sink,
            attach: self.attach,
        })
    }
}

impl HttpClient {
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            sink: None,
            attach: true,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `base/path`, tolerating slashes on either side.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one request. Any HTTP status, including 4xx/5xx, is `Ok`.
    ///
    /// # Errors
    /// [`Error::HttpTimeout`] when the request outlives the timeout and
    /// [`Error::Http`] for any other transport failure.
    pub fn request(&self, method: Method, path: &str, opts: &RequestOptions) -> Result<HttpResult> {
        let url = self.url_for(path);
        debug!(%method, %url, "sending request");

        let mut req = self.client.request(method.clone(), &url);
        for (name, value) in &opts.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !opts.query.is_empty() {
            req = req.query(&opts.query);
        }
        if let Some(json) = &opts.json {
            req = req.json(json);
        } else if let Some(body) = &opts.body {
            req = req.body(body.clone());
        }

        let start = Instant::now();
        let response = req.send().and_then(|resp| {
            let status = resp.status().as_u16();
            let headers: Vec<(String, String)> = resp
                .headers()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect();
            resp.text().map(|text| (status, headers, text))
        });
        let duration = start.elapsed();

        self.attach("http-request", &format!("{method} {url}\n\n{opts}"));
        let (status, headers, text) = response.map_err(|source| transport_error(&method, &url, source))?;

        info!(%method, %url, status, elapsed = ?duration, "request finished");
        self.attach("http-response", &format!("Status: {status}\n\n{text}"));
        Ok(HttpResult::new(status, text, headers, duration))
    }

    /// # Errors
    /// See [`HttpClient::request`].
    pub fn get(&self, path: &str, opts: &RequestOptions) -> Result<HttpResult> {
        self.request(Method::GET, path, opts)
    }

    /// # Errors
    /// See [`HttpClient::request`].
    pub fn post(&self, path: &str, opts: &RequestOptions) -> Result<HttpResult> {
        self.request(Method::POST, path, opts)
    }

    /// # Errors
    /// See [`HttpClient::request`].
    pub fn put(&self, path: &str, opts: &RequestOptions) -> Result<HttpResult> {
        self.request(Method::PUT, path, opts)
    }

    /// # Errors
    /// See [`HttpClient::request`].
    pub fn patch(&self, path: &str, opts: &RequestOptions) -> Result<HttpResult> {
        self.request(Method::PATCH, path, opts)
    }

    /// # Errors
    /// See [`HttpClient::request`].
    pub fn delete(&self, path: &str, opts: &RequestOptions) -> Result<HttpResult> {
        self.request(Method::DELETE, path, opts)
    }

    fn attach(&self, name: &str, content: &str) {
        if !self.attach {
            return;
        }
        match &self.sink {
            Some(sink) => sink.attach(name, content.as_bytes()),
            None => debug!(name, "no report sink configured; skipping attachment"),
        }
    }
}

fn transport_error(method: &Method, url: &str, source: reqwest::Error) -> Error {
    if source.is_timeout() {
        Error::HttpTimeout {
            method: method.to_string(),
            url: url.to_string(),
        }
    } else {
        Error::Http {
            method: method.to_string(),
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joining() {
        let client = HttpClient::builder("http://gitea:3000/api/v1/")
            .build()
            .expect("client");
        assert_eq!(client.base_url(), "http://gitea:3000/api/v1");
        assert_eq!(client.url_for("users/alice"), "http://gitea:3000/api/v1/users/alice");
        assert_eq!(client.url_for("/version"), "http://gitea:3000/api/v1/version");
        assert_eq!(client.url_for(""), "http://gitea:3000/api/v1/");
    }

    #[test]
    fn request_rendering_masks_credentials() {
        let opts = RequestOptions::new()
            .header("Authorization", "token s3cret")
            .header("Accept", "application/json")
            .query("page", "2")
            .json(&serde_json::json!({"name": "demo"}));
        let text = opts.to_string();
        assert!(text.contains("Authorization: <redacted>"));
        assert!(!text.contains("s3cret"));
        assert!(text.contains("Accept: application/json"));
        assert!(text.contains("query: page=2"));
        assert!(text.contains(r#"json: {"name":"demo"}"#));
    }

    #[test]
    fn json_and_body_replace_each_other() {
        let opts = RequestOptions::new().body("raw").json(&[1, 2]);
        assert_eq!(opts.json_body(), Some(&serde_json::json!([1, 2])));
        let opts = opts.body("raw");
        assert!(opts.json_body().is_none());
    }

    #[test]
    fn unserializable_json_is_not_sent_as_null() {
        let mut bad = std::collections::BTreeMap::new();
        bad.insert((1, 2), "tuple keys are not JSON object keys");
        let opts = RequestOptions::new().json(&bad);
        assert!(opts.json_body().is_none());
        assert!(!opts.to_string().contains("null"));

        let kept = RequestOptions::new().json(&[1]).json(&bad);
        assert_eq!(kept.json_body(), Some(&serde_json::json!([1])));
    }
}
