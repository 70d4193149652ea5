//! Client configuration
//!
//! [`ClientConfig`] holds the settings passed to the engine's `setup` call
//! when a context is created. Every field has a documented default and any
//! source (file, string, environment) only needs to name the fields it
//! overrides.
//!
//! ## Loading
//!
//! - Auto-detection of format from file extension (TOML, JSON, YAML)
//! - Environment variable substitution (`${VAR}` and `$VAR` syntax)
//! - Layering of several sources, later ones winning
//! - Environment overrides with a prefix, e.g. `TONCLIENT_ACCESS_KEY`

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const DEVNET_BASE_URL: &str = "net.ton.dev";
pub const MAINNET_BASE_URL: &str = "main.ton.dev";

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings applied to a context through `setup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network endpoints
    pub servers: Vec<String>,
    pub message_retries_count: u32,
    /// Milliseconds
    pub message_expiration_timeout: u64,
    pub message_expiration_timeout_grow_factor: f64,
    /// Milliseconds
    pub message_processing_timeout: u64,
    pub message_processing_timeout_grow_factor: f64,
    /// Milliseconds
    pub wait_for_timeout: u64,
    pub access_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: vec!["http://localhost".to_string()],
            message_retries_count: 1,
            message_expiration_timeout: 50_000,
            message_expiration_timeout_grow_factor: 1.5,
            message_processing_timeout: 50_000,
            message_processing_timeout_grow_factor: 1.5,
            wait_for_timeout: 30_000,
            access_key: String::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupParams<'a> {
    servers: &'a [String],
    message_retries_count: u32,
    message_expiration_timeout: u64,
    message_expiration_timeout_grow_factor: f64,
    message_processing_timeout: u64,
    message_processing_timeout_grow_factor: f64,
    wait_for_timeout: u64,
    access_key: &'a str,
}

impl ClientConfig {
    pub fn with_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = key.into();
        self
    }

    pub fn with_message_retries_count(mut self, count: u32) -> Self {
        self.message_retries_count = count;
        self
    }

    pub fn with_wait_for_timeout(mut self, millis: u64) -> Self {
        self.wait_for_timeout = millis;
        self
    }

    pub fn with_message_expiration_timeout(mut self, millis: u64, grow_factor: f64) -> Self {
        self.message_expiration_timeout = millis;
        self.message_expiration_timeout_grow_factor = grow_factor;
        self
    }

    pub fn with_message_processing_timeout(mut self, millis: u64, grow_factor: f64) -> Self {
        self.message_processing_timeout = millis;
        self.message_processing_timeout_grow_factor = grow_factor;
        self
    }

    /// Params for the engine's `setup` method, in the engine's key style.
    pub fn to_setup_params(&self) -> Value {
        let params = SetupParams {
            servers: &self.servers,
            message_retries_count: self.message_retries_count,
            message_expiration_timeout: self.message_expiration_timeout,
            message_expiration_timeout_grow_factor: self.message_expiration_timeout_grow_factor,
            message_processing_timeout: self.message_processing_timeout,
            message_processing_timeout_grow_factor: self.message_processing_timeout_grow_factor,
            wait_for_timeout: self.wait_for_timeout,
            access_key: &self.access_key,
        };
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_value(params).unwrap_or(Value::Null)
    }

    /// Load from a file, layered over the defaults.
    pub fn load(path: &str) -> ConfigResult<Self> {
        load_config(path)
    }

    /// Load from a file, then apply `{prefix}_*` environment overrides.
    pub fn load_with_env(path: &str, env_prefix: &str) -> ConfigResult<Self> {
        load_with_env(path, env_prefix)
    }
}

/// Detect configuration format from file extension
///
/// # Supported Extensions
///
/// - YAML: `.yaml`, `.yml`
/// - TOML: `.toml`
/// - JSON: `.json`
pub fn detect_format(path: &str) -> ConfigResult<FileFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid pattern"));
static SIMPLE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid pattern"));

/// Substitute environment variables in a string
///
/// Supports `${VAR_NAME}` and `$VAR_NAME`. Unknown variables are left as
/// written.
pub fn substitute_env_vars(content: &str) -> String {
    let result = BRACED_VAR
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string();

    SIMPLE_VAR
        .replace_all(&result, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

fn build<T: DeserializeOwned>(builder: config::ConfigBuilder<config::builder::DefaultState>) -> ConfigResult<T> {
    builder
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Load configuration from a file
pub fn load_config<T>(path: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    debug!("Loading config from {}", path);
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path).inspect_err(|e| warn!("Cannot read config {}: {}", path, e))?;
    let substituted = substitute_env_vars(&content);

    build(Cfg::builder().add_source(File::from_str(&substituted, format)))
        .inspect_err(|e| warn!("Invalid config {}: {}", path, e))
}

/// Load configuration from a string with explicit format
pub fn from_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let substituted = substitute_env_vars(content);
    build(Cfg::builder().add_source(File::from_str(&substituted, format)))
}

/// Merge multiple configuration sources
///
/// Later sources override earlier ones.
pub fn merge_configs<T>(sources: &[(&str, FileFormat)]) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let mut builder = Cfg::builder();
    for (content, format) in sources {
        let substituted = substitute_env_vars(content);
        builder = builder.add_source(File::from_str(&substituted, *format));
    }
    build(builder)
}

/// Load configuration with environment variable overrides
///
/// `TONCLIENT_WAIT_FOR_TIMEOUT=1000` overrides `wait_for_timeout` for the
/// prefix `TONCLIENT`. `servers` accepts a comma-separated list.
pub fn load_with_env<T>(path: &str, env_prefix: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    debug!("Loading config from {} with env prefix {}", path, env_prefix);
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path).inspect_err(|e| warn!("Cannot read config {}: {}", path, e))?;
    let substituted = substitute_env_vars(&content);

    build(
        Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("servers"),
            ),
    )
    .inspect_err(|e| warn!("Invalid config {}: {}", path, e))
}

#[cfg(test)]
mod tests;
