use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Outcome of one external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    code: i32,
    stdout: String,
    stderr: String,
    #[serde(rename = "duration_secs", serialize_with = "duration_secs")]
    duration: Duration,
}

impl CommandResult {
    #[must_use]
    pub fn new(code: i32, stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            code,
            stdout,
            stderr,
            duration,
        }
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        self.code == 0
    }

    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Captured standard output with surrounding whitespace removed.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured standard error with surrounding whitespace removed.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Both streams joined by a newline, for callers that grep either one.
    #[must_use]
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (_, true) => self.stdout.clone(),
            _ => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Outcome of one HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResult {
    status: u16,
    text: String,
    json: Option<serde_json::Value>,
    headers: BTreeMap<String, String>,
    #[serde(rename = "duration_secs", serialize_with = "duration_secs")]
    duration: Duration,
}

impl HttpResult {
    /// Build a result, parsing `text` as JSON when it is valid JSON.
    #[must_use]
    pub fn new<I, K, V>(status: u16, text: String, headers: I, duration: Duration) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let json = serde_json::from_str(&text).ok();
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let value = value.into();
            map.entry(name.as_ref().to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        Self {
            status,
            text,
            json,
            headers: map,
            duration,
        }
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed body, or `None` when the body is not JSON.
    #[must_use]
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }

    /// Header lookup; names compare case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

pub(crate) fn duration_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
