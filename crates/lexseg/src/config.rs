use std::path::{Path, PathBuf};

use lexseg_core::metadata::MetadataConfig;
use lexseg_core::signature::{FootnoteSignatures, OpinionSignatures};
use lexseg_core::RunConfig;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

const APP_DIRNAME: &str = "lexseg";
const CONFIG_FILENAME: &str = "config.toml";
const DATABASE_FILENAME: &str = "lexseg.db";

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file. Falls back to the user data directory.
    pub database: Option<PathBuf>,
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub footnote: FootnoteSignatures,
    pub opinion: OpinionSignatures,
    pub metadata: MetadataConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Load the config file.
    ///
    /// An explicit path must exist. The default location is optional and a
    /// missing file yields the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(Error::ConfigNotFound(path.display().to_string()).into())
            }
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    log::debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        log::debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).map_err(|reason| {
            Error::InvalidConfig {
                path: path.display().to_string(),
                reason,
            }
            .into()
        })
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(raw).map_err(|e| e.to_string())?;
        if config.store.batch_size == 0 {
            return Err("store.batch_size must be at least 1".to_string());
        }
        Ok(config)
    }

    pub fn engine(&self) -> RunConfig {
        RunConfig {
            footnote: self.footnote.clone(),
            opinion: self.opinion.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Database path: the CLI flag wins over the config file, which wins
    /// over the user data directory.
    pub fn database_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag.or(self.store.database.as_deref()) {
            return Ok(path.to_path_buf());
        }
        let data_dir = dirs_next::data_local_dir()
            .or_else(dirs_next::data_dir)
            .ok_or_else(|| eyre!("Unable to determine data directory"))?;
        Ok(data_dir.join(APP_DIRNAME).join(DATABASE_FILENAME))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join(APP_DIRNAME).join(CONFIG_FILENAME))
}
