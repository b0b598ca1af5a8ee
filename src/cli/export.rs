// src/cli/export.rs
use std::path::Path;
use std::process::ExitCode;
use tracing::info;

use super::{open_session, ViewArgs};
use crate::settings::AppSettings;
use crate::sheets::database::sheet_file;
use crate::sheets::session::SessionError;

pub fn run(settings: &AppSettings, to: &Path, view: &ViewArgs) -> Result<ExitCode, SessionError> {
    let session = open_session(settings)?;
    let shown = view.apply(session.baseline())?;
    sheet_file::write_snapshot(to, &shown)?;

    info!("Exported {} rows to {:?}", shown.len(), to);
    println!("Wrote {} rows to {}", shown.len(), to.display());
    if view.row_filter().is_some() {
        println!("This is a filtered view; pass --filtered when diffing, sending or saving it.");
    }
    Ok(ExitCode::SUCCESS)
}
