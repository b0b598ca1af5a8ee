// src/settings/io.rs
use directories_next::ProjectDirs;
use std::fs;
use std::io::{self, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "GridSync";
const APPLICATION: &str = "grid-sync";
const CONFIG_FILE: &str = "settings.json";

pub fn get_config_path() -> io::Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION) {
        Ok(proj_dirs.config_dir().join(CONFIG_FILE))
    } else {
        Err(io::Error::new(ErrorKind::NotFound, "Could not determine project directories for settings."))
    }
}

/// Loads settings from the platform config directory.
pub fn load_settings_from_file<T: for<'de> serde::de::Deserialize<'de> + Default>() -> io::Result<T> {
    let config_file = get_config_path()?;
    load_settings_from_path(&config_file)
}

/// Loads settings from `path`; a missing file yields the defaults.
pub fn load_settings_from_path<T: for<'de> serde::de::Deserialize<'de> + Default>(path: &Path) -> io::Result<T> {
    debug!("Settings: attempting to load {:?}", path);
    match fs::File::open(path) {
        Ok(file) => {
            let reader = BufReader::new(file);
            match serde_json::from_reader(reader) {
                Ok(settings) => {
                    info!("Settings: loaded {:?}", path);
                    Ok(settings)
                }
                Err(e) => {
                    error!("Settings: failed to parse {:?}: {}", path, e);
                    Err(io::Error::new(ErrorKind::InvalidData, format!("Failed to parse settings file {:?}: {}", path, e)))
                }
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Settings: {:?} not found, using defaults", path);
            Ok(Default::default())
        }
        Err(e) => {
            error!("Settings: failed to open {:?}: {}", path, e);
            Err(e)
        }
    }
}
