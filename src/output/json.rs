use serde::Serialize;

/// Pretty JSON for any result type the CLI prints.
#[must_use]
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|err| serde_json::json!({ "error": err.to_string() }).to_string())
}
