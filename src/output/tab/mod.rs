use std::time::Duration;

use clap::ValueEnum;

mod logs;
mod matrix;
mod result;
mod style;

pub use logs::format_logs;
pub use matrix::format_matrix;
pub use result::{format_command, format_http};

/// Border set for every table the CLI prints.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum TabStyle {
    #[default]
    Rounded,
    Sharp,
    Modern,
    Ascii,
    /// Header rule only; pastes cleanly into terminals and CI logs.
    Psql,
    Markdown,
    /// No borders at all, for grepping.
    Empty,
}

fn secs(d: Duration) -> String {
    format!("{:.3}s", d.as_secs_f64())
}

fn status_word(ok: bool) -> &'static str {
    if ok { "ok" } else { "FAILED" }
}
