use crate::classify::{BuiltinCatalogue, MatchOptions};
use crate::error::{Result, TiermarkError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

pub const DB_ENV_VAR: &str = "TIERMARK_DB";

pub struct Config {
    pub db_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub settings: EngineSettings,
}

impl Config {
    pub fn new(db_override: Option<PathBuf>, config_override: Option<PathBuf>) -> Result<Self> {
        let db_path = if let Some(path) = db_override {
            path
        } else if let Ok(env_path) = std::env::var(DB_ENV_VAR) {
            PathBuf::from(env_path)
        } else {
            let xdg = BaseDirectories::with_prefix("tiermark")
                .map_err(|e| TiermarkError::Config(format!("Failed to initialize XDG directories: {}", e)))?;
            xdg.place_data_file("tiermark.db")
                .map_err(|e| TiermarkError::Config(format!("Failed to create data directory: {}", e)))?
        };

        let config_path = config_override.or_else(|| {
            BaseDirectories::with_prefix("tiermark")
                .ok()
                .and_then(|xdg| xdg.find_config_file("tiermark.toml"))
        });

        let settings = match &config_path {
            Some(path) => EngineSettings::from_file(path)?,
            None => EngineSettings::default(),
        };

        Ok(Self {
            db_path,
            config_path,
            settings,
        })
    }

    pub fn ensure_db_directory(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Settings read from `tiermark.toml`.
///
/// ```toml
/// case_insensitive = false
/// seed_builtin_rules = true
/// builtin_rules = "/etc/tiermark/rules.toml"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub case_insensitive: bool,
    pub seed_builtin_rules: bool,
    /// Replaces the bundled catalogue when set.
    pub builtin_rules: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            seed_builtin_rules: true,
            builtin_rules: None,
        }
    }
}

impl EngineSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| TiermarkError::Config(format!("Failed to parse settings: {}", e)))
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_insensitive: self.case_insensitive,
        }
    }

    pub fn catalogue(&self) -> Result<BuiltinCatalogue> {
        match &self.builtin_rules {
            Some(path) => BuiltinCatalogue::from_file(path),
            None => BuiltinCatalogue::bundled(),
        }
    }
}
