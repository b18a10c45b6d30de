use ::config::{Config, Environment, File, FileFormat};
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, CONFIG_VERSION};

pub const DEFAULT_CONFIG_PATH: &str = "./logscope.ron";
const ENV_PREFIX: &str = "LOGSCOPE";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogscopeConfig {
    pub version: f32,
    /// address the local query surface binds to
    pub listen: String,
    pub remote: RemoteConfig,
    /// buffered fetch failures per diagnostics subscriber
    pub diagnostics_capacity: usize,
    /// devices loaded when serving starts
    pub preload: Vec<PreloadConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreloadConfig {
    pub serial_number: String,
    /// how far back to load, ex. `"2h"`
    pub since: String,
}

impl Default for LogscopeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            listen: "127.0.0.1:3000".to_string(),
            remote: RemoteConfig::default(),
            diagnostics_capacity: 64,
            preload: Vec::new(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

impl LogscopeConfig {
    /// Load `file_path` (RON, optional) with `LOGSCOPE__*` environment overrides on top.
    pub fn load(file_path: &str) -> Result<Self, ConfigError> {
        let cfg: Self = Config::builder()
            .add_source(File::new(file_path, FileFormat::Ron).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = Config::builder()
            .add_source(File::from_str(s, FileFormat::Ron))
            .build()?
            .try_deserialize()?;
        cfg.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::WrongVersion {
                got: self.version,
                expected: CONFIG_VERSION,
            });
        }
        for p in &self.preload {
            p.since()?;
        }
        Ok(self)
    }
}

impl PreloadConfig {
    pub fn since(&self) -> Result<SignedDuration, ConfigError> {
        parse_duration(&self.since)
    }
}

pub fn parse_duration(s: &str) -> Result<SignedDuration, ConfigError> {
    s.parse()
        .map_err(|e: jiff::Error| ConfigError::BadDuration(s.to_string(), e.to_string()))
}
