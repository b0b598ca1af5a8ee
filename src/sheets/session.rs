// src/sheets/session.rs
//! Baseline/edited lifecycle behind the Show, Refresh, Save and Send actions.
//!
//! The session owns the store and the last loaded baseline. An edited
//! snapshot only replaces the baseline after it has been persisted, so a
//! failed send never loses the edits: the caller still holds them and can
//! save or resend.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::database::{Revision, SnapshotStore, StorageError};
use super::diff::{diff, ChangeRecord, DeletionPolicy, DiffOptions, DiffScope};
use super::payload::{self, Payload, PayloadMode};
use super::sync::{SyncError, SyncResult, WebhookTransport};
use super::table_snapshot::TableSnapshot;
use super::validation::ValidationError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Whether a send also saves the edited snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Sending and saving are separate actions. The baseline stays put, so
    /// sending the same edits again resends the same changes.
    #[default]
    Never,
    /// Save after the webhook accepted the payload.
    OnSuccess,
    /// Save after every send attempt, accepted or not.
    Always,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    /// Column shown first; the stored order is not changed.
    pub leading_column: Option<String>,
    pub payload_mode: PayloadMode,
    pub deletions: DeletionPolicy,
    pub persist_after_send: PersistPolicy,
}

/// What a send did. `result` is `None` when nothing changed and no request
/// was made.
#[derive(Debug)]
pub struct SendReport {
    pub changes: Vec<ChangeRecord>,
    pub descriptions: Vec<String>,
    pub payload: Payload,
    pub result: Option<SyncResult>,
    /// Outcome of the persist-after-send policy, when it ran.
    pub persisted: Option<Result<Revision, SessionError>>,
}

impl SendReport {
    pub fn was_sent(&self) -> bool {
        self.result.is_some()
    }

    /// True unless a request was made and rejected.
    pub fn succeeded(&self) -> bool {
        self.result.as_ref().map_or(true, |r| r.success)
    }
}

pub struct EditSession {
    store: Box<dyn SnapshotStore>,
    baseline: TableSnapshot,
    stored_order: Vec<String>,
    revision: Revision,
    loaded_at: DateTime<Local>,
    config: SessionConfig,
}

impl EditSession {
    pub fn open(store: Box<dyn SnapshotStore>, config: SessionConfig) -> Result<Self, SessionError> {
        let loaded = store.load()?;
        info!(
            "Loaded {} rows from {} (revision {})",
            loaded.snapshot.len(),
            store.describe(),
            loaded.revision
        );
        let stored_order = header_order(&loaded.snapshot);
        let baseline = project(&loaded.snapshot, &config);
        Ok(Self {
            store,
            baseline,
            stored_order,
            revision: loaded.revision,
            loaded_at: Local::now(),
            config,
        })
    }

    /// Baseline as shown to the operator, leading column first.
    pub fn baseline(&self) -> &TableSnapshot {
        &self.baseline
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn loaded_at(&self) -> DateTime<Local> {
        self.loaded_at
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Reloads the baseline from the store.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        let loaded = self.store.load()?;
        self.stored_order = header_order(&loaded.snapshot);
        self.baseline = project(&loaded.snapshot, &self.config);
        self.revision = loaded.revision;
        self.loaded_at = Local::now();
        info!("Refreshed baseline at revision {}", self.revision);
        Ok(())
    }

    pub fn changes(&self, edited: &TableSnapshot, scope: DiffScope) -> Result<Vec<ChangeRecord>, SessionError> {
        let options = DiffOptions {
            scope,
            deletions: self.config.deletions,
        };
        Ok(diff(&self.baseline, edited, &options)?)
    }

    /// Persists `edited`, which becomes the new baseline. A filtered view is
    /// laid over the baseline first so rows outside the filter are kept.
    pub fn save(&mut self, edited: &TableSnapshot, scope: DiffScope) -> Result<Revision, SessionError> {
        let full = match scope {
            DiffScope::Full => edited.clone(),
            DiffScope::Filtered => self.baseline.overlay(edited)?,
        };
        let stored = full.reorder_columns(&self.stored_order)?;
        let revision = match self.store.persist(&stored, Some(self.revision)) {
            Ok(revision) => revision,
            Err(e) => {
                error!("Save to {} failed: {}", self.store.describe(), e);
                return Err(e.into());
            }
        };
        self.baseline = project(&stored, &self.config);
        self.revision = revision;
        info!("Saved {} rows (revision {})", stored.len(), revision);
        Ok(revision)
    }

    /// Diffs and builds the payload without sending anything.
    pub fn prepare(&self, edited: &TableSnapshot, scope: DiffScope) -> Result<SendReport, SessionError> {
        let changes = self.changes(edited, scope)?;
        let payload = payload::build(&changes, self.config.payload_mode, edited);
        Ok(SendReport {
            descriptions: changes.iter().map(ChangeRecord::describe).collect(),
            changes,
            payload,
            result: None,
            persisted: None,
        })
    }

    /// Sends the changes of `edited` through `transport`. An empty payload is
    /// never sent.
    pub fn send(
        &mut self,
        edited: &TableSnapshot,
        scope: DiffScope,
        transport: &dyn WebhookTransport,
    ) -> Result<SendReport, SessionError> {
        let mut report = self.prepare(edited, scope)?;
        if report.payload.is_empty() {
            info!("No changes detected; nothing sent");
            return Ok(report);
        }

        let result = transport.send(&report.payload);
        if result.success {
            info!("Sent {} changes: {}", report.changes.len(), result.message);
        } else {
            warn!("Send failed, edits kept for retry: {}", result.message);
        }

        let persist = match self.config.persist_after_send {
            PersistPolicy::Never => false,
            PersistPolicy::OnSuccess => result.success,
            PersistPolicy::Always => true,
        };
        report.result = Some(result);
        if persist {
            report.persisted = Some(self.save(edited, scope));
        }
        Ok(report)
    }
}

fn header_order(snapshot: &TableSnapshot) -> Vec<String> {
    snapshot.columns().iter().map(|c| c.header.clone()).collect()
}

fn project(snapshot: &TableSnapshot, config: &SessionConfig) -> TableSnapshot {
    match &config.leading_column {
        Some(column) => snapshot.with_leading_column(column),
        None => snapshot.clone(),
    }
}
