// src/cli/mod.rs
// Command-line shell over the edit session: show, export, diff, send, save, import

pub mod diff;
pub mod export;
pub mod import;
pub mod save;
pub mod send;
pub mod show;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::settings::{io as settings_io, AppSettings};
use crate::sheets::database::{open_store, sheet_file, StoreKind};
use crate::sheets::diff::DiffScope;
use crate::sheets::filter::RowFilter;
use crate::sheets::payload::PayloadMode;
use crate::sheets::session::{EditSession, PersistPolicy, SessionError};
use crate::sheets::table_snapshot::TableSnapshot;

#[derive(Parser, Debug)]
#[command(name = "grid-sync")]
#[command(about = "Detect edits to the TP Import grid, push them to the webhook and save them", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Storage engine holding the baseline
    #[arg(long, value_enum, global = true)]
    pub store: Option<StoreKind>,

    /// Database or workbook path
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    /// Key column; pass an empty value to key rows by position
    #[arg(long, global = true)]
    pub key_column: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the baseline grid and when it was loaded
    Show {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Write the baseline (or a filtered view of it) to a workbook for editing
    Export {
        /// Workbook to write
        #[arg(long)]
        to: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
    },

    /// List the cells that differ between the baseline and an edited workbook
    Diff {
        #[command(flatten)]
        edited: EditedArgs,
        /// Report rows missing from the edited workbook as deleted
        #[arg(long)]
        report_deletions: bool,
    },

    /// Send the changes of an edited workbook to the webhook
    ///
    /// The baseline only moves when the edits are saved. Without `--persist`,
    /// run `save` after a successful send, or the next send reports and sends
    /// the same changes again.
    Send {
        #[command(flatten)]
        edited: EditedArgs,
        /// Payload granularity
        #[arg(long, value_enum)]
        mode: Option<PayloadMode>,
        /// Build and print the payload without sending it
        #[arg(long)]
        dry_run: bool,
        /// Save the edited workbook after sending
        #[arg(long, value_enum)]
        persist: Option<PersistPolicy>,
        /// Webhook URL
        #[arg(long)]
        webhook_url: Option<String>,
        /// Pinned root CA (PEM)
        #[arg(long)]
        ca_cert: Option<PathBuf>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Save an edited workbook as the new baseline
    Save {
        #[command(flatten)]
        edited: EditedArgs,
    },

    /// Replace the stored grid with the sheet of a workbook
    Import {
        /// Workbook to read
        #[arg(long)]
        from: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Only rows where COLUMN contains TEXT (case-insensitive)
    #[arg(long, value_name = "COLUMN=TEXT", conflicts_with = "search")]
    pub filter: Option<RowFilter>,
    /// Only rows where any column contains TEXT (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,
}

impl ViewArgs {
    pub fn row_filter(&self) -> Option<RowFilter> {
        self.filter
            .clone()
            .or_else(|| self.search.as_ref().map(RowFilter::anywhere))
    }

    pub fn apply(&self, snapshot: &TableSnapshot) -> Result<TableSnapshot, SessionError> {
        match self.row_filter() {
            Some(filter) => Ok(filter.apply(snapshot)?),
            None => Ok(snapshot.clone()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EditedArgs {
    /// Edited workbook
    #[arg(long)]
    pub edited: PathBuf,
    /// The workbook holds a filtered view; rows missing from it are left alone
    #[arg(long)]
    pub filtered: bool,
}

impl EditedArgs {
    pub fn scope(&self) -> DiffScope {
        if self.filtered {
            DiffScope::Filtered
        } else {
            DiffScope::Full
        }
    }
}

impl Cli {
    /// Settings file, then `.env`/environment, then command-line flags.
    pub fn load_settings(&self) -> std::io::Result<AppSettings> {
        let mut settings: AppSettings = match &self.settings {
            Some(path) => settings_io::load_settings_from_path(path)?,
            None => settings_io::load_settings_from_file()?,
        };
        settings.apply_env();
        self.apply_flags(&mut settings);
        Ok(settings)
    }

    pub fn apply_flags(&self, settings: &mut AppSettings) {
        if let Some(kind) = self.store {
            settings.store_kind = kind;
        }
        if let Some(path) = &self.path {
            settings.store_path = path.clone();
        }
        if let Some(key) = &self.key_column {
            settings.key_column = Some(key.clone()).filter(|k| !k.trim().is_empty());
        }
    }
}

pub fn open_session(settings: &AppSettings) -> Result<EditSession, SessionError> {
    let store = open_store(settings.store_kind, &settings.store_path, settings.layout())?;
    EditSession::open(store, settings.session_config())
}

pub fn read_edited(settings: &AppSettings, path: &Path) -> Result<TableSnapshot, SessionError> {
    Ok(sheet_file::read_snapshot(path, &settings.layout())?)
}

pub fn run(cli: Cli, mut settings: AppSettings) -> Result<ExitCode, SessionError> {
    match cli.command {
        Commands::Show { view } => show::run(&settings, &view),
        Commands::Export { to, view } => export::run(&settings, &to, &view),
        Commands::Diff {
            edited,
            report_deletions,
        } => diff::run(&settings, &edited, report_deletions),
        Commands::Send {
            edited,
            mode,
            dry_run,
            persist,
            webhook_url,
            ca_cert,
            timeout,
        } => {
            if let Some(mode) = mode {
                settings.payload_mode = mode;
            }
            if let Some(persist) = persist {
                settings.persist_after_send = persist;
            }
            if let Some(url) = webhook_url {
                settings.webhook_url = Some(url);
            }
            if let Some(ca) = ca_cert {
                settings.ca_cert = ca;
            }
            if let Some(secs) = timeout {
                settings.timeout_secs = secs;
            }
            send::run(&settings, &edited, dry_run)
        }
        Commands::Save { edited } => save::run(&settings, &edited),
        Commands::Import { from } => import::run(&settings, &from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_flags() {
        let cli = Cli::try_parse_from([
            "grid-sync",
            "--store",
            "file",
            "send",
            "--edited",
            "edited.json",
            "--filtered",
            "--mode",
            "field",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(StoreKind::File));
        match cli.command {
            Commands::Send {
                edited,
                mode,
                dry_run,
                ..
            } => {
                assert_eq!(edited.scope(), DiffScope::Filtered);
                assert_eq!(mode, Some(PayloadMode::FieldLevel));
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_filter_and_search_conflict() {
        let parsed = Cli::try_parse_from(["grid-sync", "show", "--filter", "Status=open", "--search", "x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from(["grid-sync", "--path", "other.db", "--key-column", "", "show"]).unwrap();
        let mut settings = AppSettings::default();
        cli.apply_flags(&mut settings);
        assert_eq!(settings.store_path, PathBuf::from("other.db"));
        assert_eq!(settings.key_column, None);
    }

    #[test]
    fn test_view_args_filter() {
        let cli = Cli::try_parse_from(["grid-sync", "show", "--filter", "Status=open"]).unwrap();
        let Commands::Show { view } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(view.row_filter(), Some(RowFilter::on_column("Status", "open")));
    }
}
