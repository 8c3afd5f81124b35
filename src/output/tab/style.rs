use tabled::{
    Table,
    builder::Builder,
    settings::{Panel, Style, object::Rows, style::LineText},
};

use super::TabStyle;

fn frame(table: &mut Table, style: TabStyle) {
    match style {
        TabStyle::Rounded => table.with(Style::rounded()),
        TabStyle::Sharp => table.with(Style::sharp()),
        TabStyle::Modern => table.with(Style::modern()),
        TabStyle::Ascii => table.with(Style::ascii()),
        TabStyle::Psql => table.with(Style::psql()),
        TabStyle::Markdown => table.with(Style::markdown()),
        TabStyle::Empty => table.with(Style::empty()),
    };
}

/// Frame the table and write `title` into its top border.
pub(crate) fn titled(mut table: Table, style: TabStyle, title: &str) -> String {
    frame(&mut table, style);
    table.with(LineText::new(format!(" {title} "), Rows::first()).offset(1));
    table.to_string()
}

/// Single `(none)` cell under a header panel.
pub(crate) fn placeholder(style: TabStyle, title: &str) -> String {
    let mut builder = Builder::default();
    builder.push_record(["(none)"]);
    let mut table = builder.build();
    frame(&mut table, style);
    table.with(Panel::header(format!(" {title} ")));
    table.to_string()
}
