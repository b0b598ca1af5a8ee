// src/cli/save.rs
use std::process::ExitCode;

use super::{open_session, read_edited, EditedArgs};
use crate::settings::AppSettings;
use crate::sheets::session::SessionError;

pub fn run(settings: &AppSettings, edited: &EditedArgs) -> Result<ExitCode, SessionError> {
    let mut session = open_session(settings)?;
    let edited_snapshot = read_edited(settings, &edited.edited)?;
    let changed = session.changes(&edited_snapshot, edited.scope())?.len();

    let revision = session.save(&edited_snapshot, edited.scope())?;
    println!("Changes saved successfully ({} changed cells, revision {}).", changed, revision);
    Ok(ExitCode::SUCCESS)
}
