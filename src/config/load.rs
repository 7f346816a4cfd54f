use super::paths::{default_data_dir, default_global_config_path, DATA_DIR_ENV};
use super::{ConfigError, Settings};
use std::path::{Path, PathBuf};

pub fn load_global_settings() -> Result<Settings, ConfigError> {
    let path = default_global_config_path()?;
    load_settings(&path)
}

/// Reads settings from `path`, or defaults when the file does not exist.
/// `JOBSMITH_DATA_DIR` overrides the configured data dir. A relative data dir
/// resolves against the config file's directory.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let mut settings = if path.exists() {
        Settings::from_path(path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Settings::default()
    };

    if let Some(data_dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        settings.data_dir = PathBuf::from(data_dir);
    } else if settings.data_dir.as_os_str().is_empty() {
        settings.data_dir = default_data_dir()?;
    } else if settings.data_dir.is_relative() {
        if let Some(parent) = path.parent() {
            settings.data_dir = parent.join(&settings.data_dir);
        }
    }

    settings.validate()?;
    Ok(settings)
}
