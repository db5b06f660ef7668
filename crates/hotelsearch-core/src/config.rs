//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`APP_UPLOAD__BATCH_SIZE=10`). Credentials are read
//! separately from `SEARCH_API_*`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub search: SearchSettings,
    pub data: DataSettings,
    pub upload: UploadSettings,
    pub consistency: ConsistencySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Overrides the name declared in the schema document when set.
    pub index_name: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    pub schema_file: String,
    pub records_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencySettings {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search: SearchSettings { index_name: None, api_version: "2023-11-01".to_string(), timeout_secs: 30 },
            data: DataSettings {
                schema_file: "data/hotels_quickstart_index.json".to_string(),
                records_file: "data/hotels.json".to_string(),
            },
            upload: UploadSettings { batch_size: 1000 },
            consistency: ConsistencySettings { poll_interval_ms: 1000, max_polls: 10 },
        }
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

impl ConsistencySettings {
    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }
}

/// Service endpoint and admin key, read from `SEARCH_API_ENDPOINT` and
/// `SEARCH_API_KEY`.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub endpoint: String,
    pub key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("endpoint", &self.endpoint).field("key", &"<redacted>").finish()
    }
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory, picking the environment from `RUST_ENV`.
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(&env::current_dir()?, &env_name)
    }

    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Config(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> { Ok(self.figment.extract()?) }

    /// Resolve a configured data path against the directory the config was loaded from.
    pub fn resolve_path<S: AsRef<str>>(&self, p: S) -> PathBuf { resolve_with_base(&self.base_dir, p) }

    /// Missing or empty values yield `Error::ConfigurationMissing`.
    pub fn credentials(&self) -> Result<Credentials> {
        let endpoint = env::var("SEARCH_API_ENDPOINT").ok();
        let key = env::var("SEARCH_API_KEY").ok();
        match (endpoint.filter(|s| !s.trim().is_empty()), key.filter(|s| !s.trim().is_empty())) {
            (Some(endpoint), Some(key)) => Ok(Credentials { endpoint: endpoint.trim().to_string(), key: key.trim().to_string() }),
            (None, _) => Err(Error::ConfigurationMissing("SEARCH_API_ENDPOINT is not set".to_string())),
            (_, None) => Err(Error::ConfigurationMissing("SEARCH_API_KEY is not set".to_string())),
        }
    }

    fn validate(&self) -> Result<()> {
        let settings = self.settings()?;
        if settings.upload.batch_size == 0 { return Err(Error::Config("upload.batch_size must be at least 1".to_string())); }
        if settings.consistency.max_polls == 0 { return Err(Error::Config("consistency.max_polls must be at least 1".to_string())); }
        if settings.search.api_version.trim().is_empty() { return Err(Error::Config("search.api_version is empty".to_string())); }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
