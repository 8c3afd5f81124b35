use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, object::Columns},
};

use crate::matrix::MatrixOutcome;

use super::{
    TabStyle, secs, status_word,
    style::{placeholder, titled},
};

#[must_use]
pub fn format_matrix(outcomes: &[MatrixOutcome], style: TabStyle) -> String {
    if outcomes.is_empty() {
        return placeholder(style, "Clone Matrix");
    }

    let mut builder = Builder::default();
    builder.push_record(["Protocol", "URL", "Code", "Duration", "Status", "Log"]);
    for outcome in outcomes {
        let status = match &outcome.error {
            Some(err) => err.clone(),
            None => status_word(outcome.ok()).to_string(),
        };
        builder.push_record([
            outcome.protocol.to_string(),
            outcome.url.clone().unwrap_or_else(|| "-".to_string()),
            outcome.code.to_string(),
            secs(outcome.duration),
            status,
            outcome
                .log
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ]);
    }

    let mut table = builder.build();
    // Columns: 0 Protocol, 1 URL, 2 Code, 3 Duration, 4 Status, 5 Log
    table.with(Modify::new(Columns::new(2..4)).with(Alignment::right()));
    titled(table, style, "Clone Matrix")
}
