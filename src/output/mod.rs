pub mod json;
pub mod tab;

pub use json::to_json;
pub use tab::{TabStyle, format_command, format_http, format_logs, format_matrix};
