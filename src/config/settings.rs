use super::paths::{INPUTS_DIR_NAME, OUTPUTS_DIR_NAME, RUNTIME_DIR_NAME};
use super::ConfigError;
use crate::orchestration::manifest::DEFAULT_OUTPUT_CATEGORIES;
use crate::orchestration::tool_schema::ParamSpec;
use crate::shared::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_PLANNER_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_PLANNER_MODEL: &str = "phi3:mini";
pub const DEFAULT_PLANNER_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_PLANNER_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_TOOL_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Root holding `inputs/`, `outputs/` and `runtime/`. Empty means the
    /// loader fills in a default.
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub planner: PlannerSettings,
    #[serde(default)]
    pub tools: Vec<ToolSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerSettings {
    #[serde(default = "default_planner_base_url")]
    pub base_url: String,
    #[serde(default = "default_planner_model")]
    pub model: String,
    #[serde(default = "default_planner_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_planner_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub prompt_template: Option<PathBuf>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            base_url: default_planner_base_url(),
            model: default_planner_model(),
            timeout_seconds: default_planner_timeout_seconds(),
            temperature: default_planner_temperature(),
            prompt_template: None,
        }
    }
}

/// An external program exposed to the planner as a tool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSettings {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_tool_category")]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub params: Option<BTreeMap<String, ParamSpec>>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl ToolSettings {
    pub fn effective_timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TOOL_TIMEOUT_SECONDS)
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Settings(
                "`data_dir` must be non-empty".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`logging.level` must be non-empty".to_string(),
            ));
        }

        if self.planner.base_url.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`planner.base_url` must be non-empty".to_string(),
            ));
        }
        if self.planner.model.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`planner.model` must be non-empty".to_string(),
            ));
        }
        if self.planner.timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "`planner.timeout_seconds` must be greater than zero".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err(ConfigError::Settings(
                    "tool names must be non-empty".to_string(),
                ));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(ConfigError::Settings(format!(
                    "tool `{}` is configured more than once",
                    tool.name
                )));
            }
            if tool.command.trim().is_empty() {
                return Err(ConfigError::Settings(format!(
                    "tool `{}` must set a non-empty `command`",
                    tool.name
                )));
            }
            if !DEFAULT_OUTPUT_CATEGORIES.contains(&tool.category.as_str()) {
                return Err(ConfigError::Settings(format!(
                    "tool `{}` has unknown category `{}`; expected one of: {}",
                    tool.name,
                    tool.category,
                    DEFAULT_OUTPUT_CATEGORIES.join(", ")
                )));
            }
            if tool.timeout_seconds == Some(0) {
                return Err(ConfigError::Settings(format!(
                    "tool `{}` timeout_seconds must be greater than zero",
                    tool.name
                )));
            }
        }
        Ok(())
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.data_dir.join(INPUTS_DIR_NAME)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.data_dir.join(OUTPUTS_DIR_NAME)
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.data_dir.join(RUNTIME_DIR_NAME)
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_planner_base_url() -> String {
    DEFAULT_PLANNER_BASE_URL.to_string()
}

fn default_planner_model() -> String {
    DEFAULT_PLANNER_MODEL.to_string()
}

fn default_planner_timeout_seconds() -> u64 {
    DEFAULT_PLANNER_TIMEOUT_SECONDS
}

fn default_planner_temperature() -> f64 {
    DEFAULT_PLANNER_TEMPERATURE
}

fn default_tool_category() -> String {
    crate::orchestration::manifest::OUTPUT_CATEGORY_MISC.to_string()
}
