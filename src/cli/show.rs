// src/cli/show.rs
use std::process::ExitCode;

use super::{open_session, ViewArgs};
use crate::settings::AppSettings;
use crate::sheets::session::SessionError;
use crate::sheets::table_snapshot::TableSnapshot;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn run(settings: &AppSettings, view: &ViewArgs) -> Result<ExitCode, SessionError> {
    let session = open_session(settings)?;
    let shown = view.apply(session.baseline())?;

    println!("{}", render_grid(&shown));
    if let Some(filter) = view.row_filter() {
        println!("{} of {} rows match '{}'", shown.len(), session.baseline().len(), filter);
    }
    println!(
        "Last refreshed: {} (revision {})",
        session.loaded_at().format(TIMESTAMP_FORMAT),
        session.revision()
    );
    Ok(ExitCode::SUCCESS)
}

/// Plain-text grid with padded columns.
pub fn render_grid(snapshot: &TableSnapshot) -> String {
    let headers = snapshot.column_names();
    let cells: Vec<Vec<String>> = snapshot
        .rows()
        .map(|(_, row)| row.iter().map(|c| c.to_string()).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(headers.clone())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        lines.push(format_line(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}
