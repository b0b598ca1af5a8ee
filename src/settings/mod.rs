// src/settings/mod.rs
pub mod io;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::sheets::database::{StoreKind, StoreLayout, DEFAULT_TABLE_NAME};
use crate::sheets::diff::DeletionPolicy;
use crate::sheets::payload::PayloadMode;
use crate::sheets::session::{PersistPolicy, SessionConfig};
use crate::sheets::sync::TlsConfig;
use crate::sheets::table_snapshot::{KeySource, DEFAULT_SHEET_NAME};

pub const WEBHOOK_URL_ENV: &str = "GRID_SYNC_WEBHOOK_URL";
pub const CA_CERT_ENV: &str = "GRID_SYNC_CA_CERT";

pub const DEFAULT_KEY_COLUMN: &str = "Portfolio Epic";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub webhook_url: Option<String>,
    pub ca_cert: PathBuf,
    pub timeout_secs: u64,
    pub store_kind: StoreKind,
    pub store_path: PathBuf,
    pub sheet_name: String,
    pub table_name: String,
    /// Business key column; `None` keys rows by stored position.
    pub key_column: Option<String>,
    pub leading_column: Option<String>,
    pub payload_mode: PayloadMode,
    pub deletions: DeletionPolicy,
    pub persist_after_send: PersistPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            ca_cert: PathBuf::from("root-ca.crt"),
            timeout_secs: 30,
            store_kind: StoreKind::Sqlite,
            store_path: PathBuf::from("tp_import.db"),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            key_column: Some(DEFAULT_KEY_COLUMN.to_string()),
            leading_column: Some(DEFAULT_KEY_COLUMN.to_string()),
            payload_mode: PayloadMode::RowLevel,
            deletions: DeletionPolicy::Ignore,
            persist_after_send: PersistPolicy::Never,
        }
    }
}

impl AppSettings {
    /// Applies `GRID_SYNC_*` overrides from the process environment, after
    /// loading a `.env` file if one is present.
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv();
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(WEBHOOK_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.webhook_url = Some(url);
        }
        if let Some(ca) = lookup(CA_CERT_ENV).filter(|v| !v.trim().is_empty()) {
            self.ca_cert = PathBuf::from(ca);
        }
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout {
            sheet_name: self.sheet_name.clone(),
            table_name: self.table_name.clone(),
            key: KeySource::from_column(self.key_column.as_deref()),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            leading_column: self.leading_column.clone().filter(|c| !c.trim().is_empty()),
            payload_mode: self.payload_mode,
            deletions: self.deletions,
            persist_after_send: self.persist_after_send,
        }
    }

    pub fn tls(&self) -> TlsConfig {
        TlsConfig::new(self.ca_cert.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
