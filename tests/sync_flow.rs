//! End-to-end edit, send and save flows over both storage engines.

use std::cell::Cell;
use std::path::Path;
use std::process::Command;

use grid_sync::sheets::database::{sheet_file, SheetFileStore, SnapshotStore, SqliteStore, StoreLayout};
use grid_sync::sheets::payload::Payload;
use grid_sync::sheets::{
    CellValue, ChangeKind, ColumnDataType, ColumnDefinition, DeletionPolicy, DiffScope, EditSession,
    KeySource, PayloadMode, RowFilter, RowKey, SessionConfig, SyncResult, TableSnapshot, WebhookTransport,
};

/// Answers every send with a fixed result and counts the calls.
struct CannedTransport {
    reply: SyncResult,
    calls: Cell<usize>,
    last_body: Cell<Option<String>>,
}

impl CannedTransport {
    fn new(reply: SyncResult) -> Self {
        Self {
            reply,
            calls: Cell::new(0),
            last_body: Cell::new(None),
        }
    }

    fn last_body(&self) -> Option<String> {
        let body = self.last_body.take();
        self.last_body.set(body.clone());
        body
    }
}

impl WebhookTransport for CannedTransport {
    fn send(&self, payload: &Payload) -> SyncResult {
        self.calls.set(self.calls.get() + 1);
        self.last_body
            .set(payload.to_body().ok().and_then(|b| String::from_utf8(b).ok()));
        self.reply.clone()
    }
}

fn layout() -> StoreLayout {
    StoreLayout {
        key: KeySource::Column("id".into()),
        ..StoreLayout::default()
    }
}

fn status_rows(rows: &[(i64, &str)]) -> TableSnapshot {
    TableSnapshot::new(
        "TP Import",
        vec![
            ColumnDefinition::new("id", ColumnDataType::I64),
            ColumnDefinition::text("status"),
        ],
        KeySource::Column("id".into()),
        rows.iter()
            .map(|(id, s)| vec![CellValue::Int(*id), CellValue::text(*s)])
            .collect(),
    )
    .unwrap()
}

fn sqlite_session(rows: &[(i64, &str)], config: SessionConfig) -> EditSession {
    let mut store = SqliteStore::in_memory(layout()).unwrap();
    store.persist(&status_rows(rows), None).unwrap();
    EditSession::open(Box::new(store), config).unwrap()
}

#[test]
fn open_to_closed_yields_one_change() {
    let session = sqlite_session(&[(1, "Open")], SessionConfig::default());
    let changes = session
        .changes(&status_rows(&[(1, "Closed")]), DiffScope::Full)
        .unwrap();

    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert_eq!(change.row_key, RowKey::Int(1));
    assert_eq!(change.column, "status");
    assert_eq!(change.original, Some(CellValue::text("Open")));
    assert_eq!(change.new, Some(CellValue::text("Closed")));
    assert_eq!(change.kind, ChangeKind::Updated);
}

#[test]
fn filtered_view_does_not_report_hidden_rows() {
    let session = sqlite_session(&[(1, "Open"), (2, "Open")], SessionConfig::default());
    let view = RowFilter::on_column("id", "1").apply(session.baseline()).unwrap();
    assert_eq!(view.len(), 1);
    let edited = view.with_cell(&RowKey::Int(1), "status", "Closed").unwrap();

    let changes = session.changes(&edited, DiffScope::Filtered).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes.iter().all(|c| c.row_key == RowKey::Int(1)));
}

#[test]
fn deletions_are_reported_only_when_asked_in_full_scope() {
    let config = SessionConfig {
        deletions: DeletionPolicy::Report,
        ..SessionConfig::default()
    };
    let session = sqlite_session(&[(1, "Open"), (2, "Open")], config);
    let edited = status_rows(&[(1, "Open")]);

    let full = session.changes(&edited, DiffScope::Full).unwrap();
    assert_eq!(full.len(), 2);
    assert!(full.iter().all(|c| c.kind == ChangeKind::Deleted && c.row_key == RowKey::Int(2)));
    assert!(session.changes(&edited, DiffScope::Filtered).unwrap().is_empty());
}

#[test]
fn empty_payload_is_never_sent() {
    let mut session = sqlite_session(&[(1, "Open")], SessionConfig::default());
    let transport = CannedTransport::new(SyncResult::accepted(200));
    let edited = session.baseline().clone();

    let report = session.send(&edited, DiffScope::Full, &transport).unwrap();
    assert!(report.payload.is_empty());
    assert!(report.result.is_none());
    assert_eq!(transport.calls.get(), 0);
}

#[test]
fn unavailable_webhook_keeps_edits_for_save() {
    let mut session = sqlite_session(&[(1, "Open")], SessionConfig::default());
    let transport = CannedTransport::new(SyncResult::rejected(503, "unavailable"));
    let edited = status_rows(&[(1, "Closed")]);

    let report = session.send(&edited, DiffScope::Full, &transport).unwrap();
    let result = report.result.as_ref().unwrap();
    assert!(!result.success);
    assert_eq!(result.status_code, Some(503));
    assert!(result.message.contains("unavailable"));
    assert_eq!(transport.calls.get(), 1);

    session.save(&edited, DiffScope::Full).unwrap();
    session.refresh().unwrap();
    assert_eq!(
        session.baseline().cell(&RowKey::Int(1), "status"),
        Some(&CellValue::text("Closed"))
    );
}

#[test]
fn field_level_payload_over_workbook_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("baseline.json");
    let edited_path = dir.path().join("edited.json");
    sheet_file::write_snapshot(&store_path, &status_rows(&[(1, "Open"), (2, "Open")])).unwrap();

    let config = SessionConfig {
        payload_mode: PayloadMode::FieldLevel,
        ..SessionConfig::default()
    };
    let store = SheetFileStore::new(&store_path, layout());
    let mut session = EditSession::open(Box::new(store), config).unwrap();

    let edited = session
        .baseline()
        .with_cell(&RowKey::Int(2), "status", "Done")
        .unwrap();
    sheet_file::write_snapshot(&edited_path, &edited).unwrap();
    let edited = sheet_file::read_snapshot(&edited_path, &layout()).unwrap();

    let transport = CannedTransport::new(SyncResult::accepted(200));
    let report = session.send(&edited, DiffScope::Full, &transport).unwrap();
    assert!(report.succeeded());
    assert_eq!(
        transport.last_body().as_deref(),
        Some(r#"[{"row_key":2,"field":"status","original_value":"Open","new_value":"Done"}]"#)
    );
}

fn write_settings(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("settings.json");
    std::fs::write(
        &path,
        r#"{"key_column": "id", "leading_column": null, "sheet_name": "TP Import"}"#,
    )
    .unwrap();
    path
}

#[test]
fn cli_dry_run_prints_changes_without_sending() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(dir.path());
    let store_path = dir.path().join("baseline.json");
    let edited_path = dir.path().join("edited.json");
    sheet_file::write_snapshot(&store_path, &status_rows(&[(1, "Open")])).unwrap();
    sheet_file::write_snapshot(&edited_path, &status_rows(&[(1, "Closed")])).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_grid-sync"))
        .current_dir(dir.path())
        .arg("--settings")
        .arg(&settings)
        .args(["--store", "file", "--path"])
        .arg(&store_path)
        .args(["send", "--dry-run", "--edited"])
        .arg(&edited_path)
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("status for 1 changed from Open to Closed"));
    assert!(stdout.contains("Dry run: nothing was sent."));
}

#[test]
fn cli_save_then_diff_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let settings = write_settings(dir.path());
    let store_path = dir.path().join("grid.db");
    let import_path = dir.path().join("import.json");
    let edited_path = dir.path().join("edited.json");
    sheet_file::write_snapshot(&import_path, &status_rows(&[(1, "Open"), (2, "Open")])).unwrap();
    sheet_file::write_snapshot(&edited_path, &status_rows(&[(1, "Open"), (2, "Closed")])).unwrap();

    let run = |args: &[&str], file: &Path| {
        Command::new(env!("CARGO_BIN_EXE_grid-sync"))
            .current_dir(dir.path())
            .arg("--settings")
            .arg(&settings)
            .args(["--store", "sqlite", "--path"])
            .arg(&store_path)
            .args(args)
            .arg(file)
            .output()
            .unwrap()
    };

    assert!(run(&["import", "--from"], &import_path).status.success());
    assert!(run(&["save", "--edited"], &edited_path).status.success());
    let diff = run(&["diff", "--edited"], &edited_path);
    assert!(diff.status.success());
    assert!(String::from_utf8_lossy(&diff.stdout).contains("No changes detected."));
}
