// src/cli/send.rs
use std::process::ExitCode;
use tracing::error;

use super::{open_session, read_edited, EditedArgs};
use crate::settings::AppSettings;
use crate::sheets::session::{SendReport, SessionError};
use crate::sheets::sync::{SyncClient, SyncError};

/// Exit status for a send the webhook did not accept.
pub const SEND_FAILED: u8 = 2;

const RESEND_HINT: &str =
    "The baseline was not updated. Run `save` with the same workbook, or the next send will resend these changes.";

pub fn run(settings: &AppSettings, edited: &EditedArgs, dry_run: bool) -> Result<ExitCode, SessionError> {
    let mut session = open_session(settings)?;
    let edited_snapshot = read_edited(settings, &edited.edited)?;

    let report = if dry_run {
        session.prepare(&edited_snapshot, edited.scope())?
    } else {
        let url = settings.webhook_url.as_deref().ok_or(SyncError::MissingEndpoint)?;
        let client = SyncClient::new(url, &settings.tls(), settings.timeout())?;
        session.send(&edited_snapshot, edited.scope(), &client)?
    };

    print_report(&report, dry_run);
    if let Some(Err(e)) = &report.persisted {
        error!("Sent, but saving the edited grid failed: {}", e);
        println!("Saving after send failed: {}", e);
        return Ok(ExitCode::FAILURE);
    }
    if report.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(SEND_FAILED))
    }
}

fn print_report(report: &SendReport, dry_run: bool) {
    if report.changes.is_empty() {
        println!("No changes detected.");
        return;
    }
    for line in &report.descriptions {
        println!("{}", line);
    }
    println!("\nData {}:\n{}", if dry_run { "to send" } else { "sent" }, report.payload.preview());
    match &report.result {
        Some(result) => println!("\n{}", result),
        None if dry_run => println!("\nDry run: nothing was sent."),
        None => {}
    }
    if let Some(Ok(revision)) = &report.persisted {
        println!("Saved edited grid (revision {}).", revision);
    }
    if let Some(hint) = resend_hint(report) {
        println!("{}", hint);
    }
}

/// Set after an accepted send that left the baseline where it was.
fn resend_hint(report: &SendReport) -> Option<&'static str> {
    (report.was_sent() && report.succeeded() && report.persisted.is_none()).then_some(RESEND_HINT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::database::Revision;
    use crate::sheets::diff::{diff, DiffOptions};
    use crate::sheets::payload::{self, PayloadMode};
    use crate::sheets::sync::SyncResult;
    use crate::sheets::table_snapshot::test_support::status_sheet;

    fn report(result: Option<SyncResult>, persisted: Option<Revision>) -> SendReport {
        let baseline = status_sheet(&[(1, "Open")]);
        let edited = status_sheet(&[(1, "Closed")]);
        let changes = diff(&baseline, &edited, &DiffOptions::default()).unwrap();
        SendReport {
            descriptions: Vec::new(),
            payload: payload::build(&changes, PayloadMode::RowLevel, &edited),
            changes,
            result,
            persisted: persisted.map(Ok),
        }
    }

    #[test]
    fn test_hint_after_accepted_send_without_save() {
        assert_eq!(resend_hint(&report(Some(SyncResult::accepted(200)), None)), Some(RESEND_HINT));
    }

    #[test]
    fn test_no_hint_when_saved_rejected_or_dry_run() {
        assert_eq!(resend_hint(&report(Some(SyncResult::accepted(200)), Some(Revision(2)))), None);
        assert_eq!(resend_hint(&report(Some(SyncResult::rejected(503, "down")), None)), None);
        assert_eq!(resend_hint(&report(None, None)), None);
    }
}
