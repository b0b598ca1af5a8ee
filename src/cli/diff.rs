// src/cli/diff.rs
use std::process::ExitCode;

use super::{open_session, read_edited, EditedArgs};
use crate::settings::AppSettings;
use crate::sheets::diff::DeletionPolicy;
use crate::sheets::session::SessionError;

pub fn run(settings: &AppSettings, edited: &EditedArgs, report_deletions: bool) -> Result<ExitCode, SessionError> {
    let mut settings = settings.clone();
    if report_deletions {
        settings.deletions = DeletionPolicy::Report;
    }
    let session = open_session(&settings)?;
    let edited_snapshot = read_edited(&settings, &edited.edited)?;
    let changes = session.changes(&edited_snapshot, edited.scope())?;

    if changes.is_empty() {
        println!("No changes detected.");
    } else {
        for change in &changes {
            println!("{}", change.describe());
        }
        println!("{} changed cells", changes.len());
    }
    Ok(ExitCode::SUCCESS)
}
