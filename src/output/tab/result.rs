use serde_json::Value;
use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, object::Columns},
};

use crate::{CommandResult, HttpResult};

use super::{
    TabStyle, secs, status_word,
    style::{placeholder, titled},
};

/// Keys tried, in order, to name one element of a listing response.
const NAME_KEYS: [&str; 5] = ["login", "username", "full_name", "name", "repo_name"];

#[must_use]
pub fn format_command(result: &CommandResult, style: TabStyle) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Status", status_word(result.ok())]);
    builder.push_record(["Return code".to_string(), result.code().to_string()]);
    builder.push_record(["Duration".to_string(), secs(result.duration())]);
    if !result.stdout().is_empty() {
        builder.push_record(["Stdout", result.stdout()]);
    }
    if !result.stderr().is_empty() {
        builder.push_record(["Stderr", result.stderr()]);
    }
    titled(builder.build(), style, "Command")
}

/// Summary table, plus a listing table when the body is a JSON array.
#[must_use]
pub fn format_http(result: &HttpResult, style: TabStyle) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Status", status_word(result.ok())]);
    builder.push_record(["HTTP status".to_string(), result.status().to_string()]);
    builder.push_record(["Duration".to_string(), secs(result.duration())]);
    if let Some(kind) = result.header("content-type") {
        builder.push_record(["Content type", kind]);
    }
    match result.json() {
        Some(Value::Array(_)) => {}
        Some(other) => {
            let body = serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
            builder.push_record(["Body".to_string(), body]);
        }
        None if !result.text().is_empty() => builder.push_record(["Body", result.text()]),
        None => {}
    }
    let mut sections = vec![titled(builder.build(), style, "Response")];
    if let Some(Value::Array(items)) = result.json() {
        sections.push(render_listing(items, style));
    }
    sections.join("\n")
}

fn render_listing(items: &[Value], style: TabStyle) -> String {
    if items.is_empty() {
        return placeholder(style, "Items");
    }

    let mut builder = Builder::default();
    builder.push_record(["Id", "Name"]);
    for item in items {
        let id = item.get("id").map(Value::to_string).unwrap_or_default();
        builder.push_record([id, item_name(item)]);
    }
    let mut table = builder.build();
    // Columns: 0 Id, 1 Name
    table.with(Modify::new(Columns::new(0..1)).with(Alignment::right()));
    titled(table, style, &format!("Items ({})", items.len()))
}

fn item_name(item: &Value) -> String {
    if let Some(s) = item.as_str() {
        return s.to_string();
    }
    NAME_KEYS
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .map_or_else(|| item.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn command_table_shows_streams_when_present() {
        let result = CommandResult::new(
            1,
            String::new(),
            "fatal: not a git repository".to_string(),
            Duration::from_millis(1500),
        );
        let out = format_command(&result, TabStyle::Empty);
        assert!(out.contains("FAILED"));
        assert!(out.contains("1.500s"));
        assert!(out.contains("fatal: not a git repository"));
        assert!(!out.contains("Stdout"));
    }

    #[test]
    fn http_object_body_is_pretty_printed() {
        let result = HttpResult::new(
            200,
            r#"{"version":"1.21.0"}"#.to_string(),
            [("Content-Type", "application/json")],
            Duration::from_millis(5),
        );
        let out = format_http(&result, TabStyle::Ascii);
        assert!(out.contains("200"));
        assert!(out.contains("\"version\": \"1.21.0\""));
        assert!(out.contains("application/json"));
    }

    #[test]
    fn http_array_body_becomes_listing() {
        let result = HttpResult::new(
            200,
            r#"[{"id":1,"login":"alice"},{"id":2,"username":"bob"},"org/unadopted"]"#.to_string(),
            Vec::<(String, String)>::new(),
            Duration::ZERO,
        );
        let out = format_http(&result, TabStyle::Empty);
        assert!(out.contains("Items (3)"));
        assert!(out.contains("alice"));
        assert!(out.contains("bob"));
        assert!(out.contains("org/unadopted"));
    }

    #[test]
    fn empty_listing_says_none() {
        let result = HttpResult::new(200, "[]".to_string(), Vec::<(String, String)>::new(), Duration::ZERO);
        assert!(format_http(&result, TabStyle::Empty).contains("(none)"));
    }

    #[test]
    fn plain_text_error_body() {
        let result = HttpResult::new(404, "not found".to_string(), Vec::<(String, String)>::new(), Duration::ZERO);
        let out = format_http(&result, TabStyle::Empty);
        assert!(out.contains("FAILED"));
        assert!(out.contains("not found"));
    }
}
