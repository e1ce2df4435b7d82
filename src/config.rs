// Runtime configuration from environment variables
//
//   GRADEBOOK_DATA_FILE   JSON data file            (students.json)
//   GRADEBOOK_BACKUP_DIR  backup directory          (backups)
//   GRADEBOOK_HOST        server bind address       (0.0.0.0)
//   GRADEBOOK_PORT        server port               (5000)
//   GRADEBOOK_WEB_DIR     static assets for the UI  (web)

use crate::persistence::JsonFileStore;
use anyhow::{anyhow, Result};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub web_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            data_file: try_load(&lookup, "GRADEBOOK_DATA_FILE", "students.json")?,
            backup_dir: try_load(&lookup, "GRADEBOOK_BACKUP_DIR", "backups")?,
            host: try_load(&lookup, "GRADEBOOK_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "GRADEBOOK_PORT", "5000")?,
            web_dir: try_load(&lookup, "GRADEBOOK_WEB_DIR", "web")?,
        })
    }

    pub fn storage(&self) -> JsonFileStore {
        JsonFileStore::new(&self.data_file, &self.backup_dir)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("Invalid {key} value: {e}")
        })
}
