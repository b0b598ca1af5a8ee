// src/cli/import.rs
use std::path::Path;
use std::process::ExitCode;
use tracing::info;

use super::read_edited;
use crate::settings::AppSettings;
use crate::sheets::database::open_store;
use crate::sheets::session::SessionError;

/// Replaces the stored grid unconditionally; no revision check.
pub fn run(settings: &AppSettings, from: &Path) -> Result<ExitCode, SessionError> {
    let snapshot = read_edited(settings, from)?;
    let mut store = open_store(settings.store_kind, &settings.store_path, settings.layout())?;
    let revision = store.persist(&snapshot, None)?;

    info!("Imported {:?} into {}", from, store.describe());
    println!(
        "Imported {} rows into {} (revision {}).",
        snapshot.len(),
        store.describe(),
        revision
    );
    Ok(ExitCode::SUCCESS)
}
