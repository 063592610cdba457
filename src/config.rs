//! Runtime configuration.
//!
//! Loaded from a TOML file; a missing file yields the defaults. The chunirec
//! token and database path can also come from the environment
//! (`CHUNIREC_TOKEN`, `CHUNI_DATABASE`), which wins over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const TOKEN_ENV: &str = "CHUNIREC_TOKEN";
pub const DATABASE_ENV: &str = "CHUNI_DATABASE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credentials: Credentials,
    pub database: DatabaseConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub chunirec_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database/database.sqlite3"),
        }
    }
}

/// Upstream endpoints. Overridable so mirrors or local fixtures can be used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub chunirec_base: String,
    pub official_url: String,
    pub community_url: String,
    pub alias_url: String,
    pub sdvxin_base: String,
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            chunirec_base: "https://api.chunirec.net".to_string(),
            official_url: "https://chunithm.sega.jp/storage/json/music.json".to_string(),
            community_url: "https://dp4p6x0xfi5o9.cloudfront.net/chunithm/data.json".to_string(),
            alias_url: "https://github.com/lomotos10/GCM-bot/raw/main/data/aliases/en/chuni.tsv"
                .to_string(),
            sdvxin_base: "https://sdvx.in".to_string(),
            timeout_secs: 600,
        }
    }
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            Self::from_toml(&text)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                self.credentials.chunirec_token = Some(token);
            }
        }
        if let Ok(path) = std::env::var(DATABASE_ENV) {
            if !path.is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }
    }

    /// The chunirec token, required before the primary sync makes any request.
    pub fn chunirec_token(&self) -> Result<&str> {
        self.credentials
            .chunirec_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MissingConfiguration("credentials.chunirec_token".to_string()))
    }
}
