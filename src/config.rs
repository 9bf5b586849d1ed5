//! Configuration file support for the annotation engine.
//!
//! Settings are stored as versioned JSON. Missing fields fall back to their
//! defaults, so older files keep loading as fields are added.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{BoundType, ImageTool, SelectionType};
use crate::selection::{ToolParams, builtin_tool_defaults};

/// Log level setting for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Attribute types shown in the external viewer panel
    #[serde(default = "default_external_viewer_types")]
    pub external_viewer_types: Vec<String>,

    /// Parameter panels seeded the first time a tool is selected
    #[serde(default = "builtin_tool_defaults")]
    pub tool_defaults: HashMap<ImageTool, ToolParams>,

    /// Selection type active after load
    #[serde(default)]
    pub default_selection_type: SelectionType,

    /// Tool active after load
    #[serde(default)]
    pub default_tool: ImageTool,
}

fn default_external_viewer_types() -> Vec<String> {
    vec!["molecule".to_string(), "latex".to_string()]
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            log_level: LogLevel::default(),
            external_viewer_types: default_external_viewer_types(),
            tool_defaults: builtin_tool_defaults(),
            default_selection_type: SelectionType::Bound(BoundType::FreeBox),
            default_tool: ImageTool::Pen,
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Read configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "task-annotator.json"
    }

    /// Get the default config file path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(
                config_dir
                    .join("task-annotator")
                    .join(Self::default_filename()),
            )
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("task-annotator")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::from_file(&path) {
            Ok(config) => {
                log::info!("Loaded configuration from {:?}", path);
                Some(config)
            }
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(&path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_gets_defaults() {
        let config = EngineConfig::from_json(r#"{"version": 1}"#).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.external_viewer_types, vec!["molecule", "latex"]);
        assert_eq!(
            config.tool_defaults[&ImageTool::Wand].value("threshold"),
            Some(35.0)
        );
    }

    #[test]
    fn test_newer_version_rejected() {
        let result = EngineConfig::from_json(r#"{"version": 99}"#);
        assert!(matches!(
            result,
            Err(ConfigError::VersionTooNew {
                file_version: 99,
                ..
            })
        ));
    }

    #[test]
    fn test_round_trip_with_overrides() {
        let json = r#"{
            "version": 1,
            "log_level": "debug",
            "external_viewer_types": ["latex"],
            "default_selection_type": "table",
            "default_tool": "wand",
            "tool_defaults": {
                "brush": {"type": "slider-number", "values": {"radius": {"value": 10, "bounds": {"min": 0, "max": 20}}}}
            }
        }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.log_level.to_level_filter(), log::LevelFilter::Debug);
        assert_eq!(
            config.default_selection_type,
            SelectionType::Bound(BoundType::Table)
        );
        assert_eq!(config.default_tool, ImageTool::Wand);
        assert_eq!(config.tool_defaults.len(), 1);

        let again = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(again, config);
    }
}
