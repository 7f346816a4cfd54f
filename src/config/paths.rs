use crate::config::ConfigError;
use std::path::PathBuf;

pub const GLOBAL_STATE_DIR: &str = ".jobsmith";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "config.yaml";
pub const DATA_DIR_ENV: &str = "JOBSMITH_DATA_DIR";

pub const INPUTS_DIR_NAME: &str = "inputs";
pub const OUTPUTS_DIR_NAME: &str = "outputs";
pub const RUNTIME_DIR_NAME: &str = "runtime";

pub fn default_global_config_path() -> Result<PathBuf, ConfigError> {
    Ok(global_state_dir()?.join(GLOBAL_SETTINGS_FILE_NAME))
}

pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    Ok(global_state_dir()?.join("data"))
}

fn global_state_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(GLOBAL_STATE_DIR))
}
