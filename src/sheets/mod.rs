// src/sheets/mod.rs

pub mod cell_value;
pub mod column_data_type;
pub mod column_definition;
pub mod database;
pub mod diff;
pub mod filter;
pub mod payload;
pub mod session;
pub mod sync;
pub mod table_snapshot;
pub mod validation;

pub use cell_value::CellValue;
pub use column_data_type::ColumnDataType;
pub use column_definition::ColumnDefinition;
pub use database::{open_store, Revision, SnapshotStore, StorageError, StoreKind, StoreLayout};
pub use diff::{diff, ChangeKind, ChangeRecord, DeletionPolicy, DiffOptions, DiffScope};
pub use filter::RowFilter;
pub use payload::{Payload, PayloadMode};
pub use session::{EditSession, PersistPolicy, SendReport, SessionConfig, SessionError};
pub use sync::{SyncClient, SyncError, SyncResult, TlsConfig, WebhookTransport};
pub use table_snapshot::{KeySource, RowKey, TableSnapshot};
pub use validation::ValidationError;
