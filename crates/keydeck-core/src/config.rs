//! Application configuration
//!
//! Stores non-sensitive configuration in a plain JSON file inside the data
//! directory. Every field is optional in the file; missing fields take their
//! defaults.

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KeydeckError, Result};
use crate::settings::SynthesisDefaults;
use crate::storage::{read_optional, AtomicFileWriter, FileWriter};

/// Overrides the data directory
pub const HOME_ENV: &str = "KEYDECK_HOME";
/// Overrides the settings target path
pub const SETTINGS_PATH_ENV: &str = "KEYDECK_SETTINGS_PATH";
/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

const CONFIG_VERSION: u32 = 1;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Config file version
    pub version: u32,
    /// Directory holding the stores and this config; never persisted
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Secret store file, relative to the data directory unless absolute
    pub secrets_file: PathBuf,
    /// Metadata store file, relative to the data directory unless absolute
    pub metadata_file: PathBuf,
    /// Settings file to export to (default `~/.claude/settings.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,
    /// Where backups go (default: next to the settings file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    /// Values written alongside the provider settings
    pub synthesis: SynthesisDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            data_dir: PathBuf::new(),
            secrets_file: PathBuf::from("secrets.env"),
            metadata_file: PathBuf::from("keys.json"),
            settings_path: None,
            backup_dir: None,
            synthesis: SynthesisDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration using the process environment for overrides
    pub fn load() -> Result<Self> {
        Self::load_with_env(|name| std::env::var(name).ok())
    }

    /// Load configuration, resolving overrides through `lookup`
    pub fn load_with_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup(HOME_ENV).filter(|v| !v.is_empty()) {
            Some(home) => PathBuf::from(home),
            None => default_data_dir()?,
        };

        let mut config = Self::load_from(&data_dir)?;
        if let Some(path) = lookup(SETTINGS_PATH_ENV).filter(|v| !v.is_empty()) {
            config.settings_path = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    /// Load `config.json` from `data_dir`, falling back to defaults when absent
    pub fn load_from(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = match read_optional(&path).map_err(|e| KeydeckError::io(&path, e))? {
            Some(contents) => {
                let config: AppConfig = serde_json::from_str(&contents)
                    .map_err(|e| KeydeckError::Config(format!("{}: {}", path.display(), e)))?;
                debug!("Loaded config from {:?}", path);
                config
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        if config.version > CONFIG_VERSION {
            return Err(KeydeckError::Config(format!(
                "{}: unsupported config version {}",
                path.display(),
                config.version
            )));
        }

        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Write the config file atomically
    pub fn save(&self) -> Result<()> {
        let path = self.config_path();
        let mut contents = serde_json::to_string_pretty(self)?;
        contents.push('\n');
        AtomicFileWriter
            .write(&path, contents.as_bytes())
            .map_err(|e| KeydeckError::io(&path, e))?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.data_dir.join(&self.secrets_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(&self.metadata_file)
    }

    /// Resolved settings target
    pub fn settings_target(&self) -> Result<PathBuf> {
        match &self.settings_path {
            Some(path) => Ok(path.clone()),
            None => default_settings_path(),
        }
    }
}

/// Platform data directory for keydeck
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("dev", "keydeck", "keydeck")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| KeydeckError::Config(format!("could not determine data directory; set {}", HOME_ENV)))
}

/// `~/.claude/settings.json`
pub fn default_settings_path() -> Result<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".claude").join("settings.json"))
        .ok_or_else(|| {
            KeydeckError::Config(format!(
                "could not determine home directory; set {}",
                SETTINGS_PATH_ENV
            ))
        })
}
