use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, object::Columns},
};

use crate::artifacts::LogFile;

use super::{
    TabStyle,
    style::{placeholder, titled},
};

#[must_use]
pub fn format_logs(logs: &[LogFile], style: TabStyle) -> String {
    if logs.is_empty() {
        return placeholder(style, "Command Logs");
    }

    let mut builder = Builder::default();
    builder.push_record(["Name", "Bytes", "Path"]);
    for log in logs {
        builder.push_record([
            log.name.clone(),
            log.bytes.to_string(),
            log.path.display().to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Modify::new(Columns::new(1..2)).with(Alignment::right()));
    titled(table, style, "Command Logs")
}
