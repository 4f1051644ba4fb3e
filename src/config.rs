//! Configuration management for meetdesk
//!
//! Settings are read from environment variables with sensible defaults, then
//! optionally overlaid by a TOML file (`--config`). Unknown keys in the file
//! are rejected.
//!
//! # Environment Variables
//!
//! - `MEETDESK_MONGODB_URI`: document store connection string - default: "mongodb://localhost:27017/"
//! - `MEETDESK_DATABASE`: database name - default: "meeting_scheduling"
//! - `MEETDESK_COLLECTION`: client collection - default: "clients"
//! - `MEETDESK_STORE_TIMEOUT`: server selection timeout in seconds - default: "5"
//! - `MEETDESK_CLIENTS_FILE`: JSON client list used instead of MongoDB - default: unset
//! - `MEETDESK_OLLAMA_ENDPOINT` (or `OLLAMA_HOST`): completion endpoint - default: "http://localhost:11434"
//! - `MEETDESK_MODELS`: comma-separated model preference - default: "gemma:2b,llama2,mistral"
//! - `MEETDESK_MATCH_THRESHOLD`: fuzzy score a name must exceed (0-100) - default: "90"
//! - `MEETDESK_MAX_RETRIES`: attempts per model - default: "3"
//! - `MEETDESK_RETRY_DELAY_MS`: pause between attempts - default: "1000"
//! - `MEETDESK_REQUEST_TIMEOUT`: per-attempt timeout in seconds - default: "30"
//! - `MEETDESK_RECOGNIZER`: entity recognizer (rules|llm) - default: "rules"
//! - `MEETDESK_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use meetdesk::AssistantConfig;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AssistantConfig::load(Some(Path::new("meetdesk.toml")))?;
//! println!("{}", config);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::directory::DEFAULT_MATCH_THRESHOLD;
use crate::llm::RetryPolicy;
use crate::response::DEFAULT_MODELS;

const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017/";
const DEFAULT_DATABASE: &str = "meeting_scheduling";
const DEFAULT_COLLECTION: &str = "clients";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Unknown recognizer name
    #[error("Invalid recognizer: {0}. Valid options: rules, llm")]
    InvalidRecognizer(String),

    /// Config file could not be read
    #[error("Failed to read config file {path}: {error}")]
    Io { path: PathBuf, error: String },

    /// Config file is not valid TOML or has unknown keys
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Which [`EntityRecognizer`](crate::extract::EntityRecognizer) to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerKind {
    #[default]
    Rules,
    Llm,
}

impl FromStr for RecognizerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "rule" | "rule-based" => Ok(RecognizerKind::Rules),
            "llm" | "model" => Ok(RecognizerKind::Llm),
            other => Err(ConfigError::InvalidRecognizer(other.to_string())),
        }
    }
}

impl fmt::Display for RecognizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognizerKind::Rules => write!(f, "rules"),
            RecognizerKind::Llm => write!(f, "llm"),
        }
    }
}

/// Optional overlay read from a TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub mongodb_uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub store_timeout_secs: Option<u64>,
    pub clients_file: Option<PathBuf>,
    pub ollama_endpoint: Option<String>,
    pub models: Option<Vec<String>>,
    pub match_threshold: Option<u8>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub recognizer: Option<RecognizerKind>,
    pub log_level: Option<String>,
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    pub fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::ParseError {
            field: origin.to_string(),
            error: e.to_string(),
        })
    }
}

/// Main configuration structure for meetdesk
///
/// `Default::default()` loads from environment variables with fallback
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    pub mongodb_uri: String,
    pub database: String,
    pub collection: String,
    pub store_timeout_secs: u64,

    /// JSON client list that replaces MongoDB when set
    pub clients_file: Option<PathBuf>,

    pub ollama_endpoint: String,

    /// Model preference, most preferred first
    pub models: Vec<String>,

    /// Fuzzy score a stored name must exceed to match (0-100)
    pub match_threshold: u8,

    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub recognizer: RecognizerKind,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Adds a scheme when `OLLAMA_HOST` style values omit it
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let ollama_endpoint = env::var("MEETDESK_OLLAMA_ENDPOINT")
            .or_else(|_| env::var("OLLAMA_HOST"))
            .map(|v| normalize_endpoint(&v))
            .unwrap_or_else(|_| DEFAULT_OLLAMA_ENDPOINT.to_string());

        let models = env::var("MEETDESK_MODELS")
            .ok()
            .map(|v| parse_model_list(&v))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect());

        let recognizer = env::var("MEETDESK_RECOGNIZER")
            .ok()
            .and_then(|v| v.parse::<RecognizerKind>().ok())
            .unwrap_or_default();

        Self {
            mongodb_uri: env::var("MEETDESK_MONGODB_URI")
                .unwrap_or_else(|_| DEFAULT_MONGODB_URI.to_string()),
            database: env::var("MEETDESK_DATABASE")
                .unwrap_or_else(|_| DEFAULT_DATABASE.to_string()),
            collection: env::var("MEETDESK_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_COLLECTION.to_string()),
            store_timeout_secs: env_parsed("MEETDESK_STORE_TIMEOUT")
                .unwrap_or(DEFAULT_STORE_TIMEOUT_SECS),
            clients_file: env::var("MEETDESK_CLIENTS_FILE").ok().map(PathBuf::from),
            ollama_endpoint,
            models,
            match_threshold: env_parsed("MEETDESK_MATCH_THRESHOLD")
                .unwrap_or(DEFAULT_MATCH_THRESHOLD),
            max_retries: env_parsed("MEETDESK_MAX_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES),
            retry_delay_ms: env_parsed("MEETDESK_RETRY_DELAY_MS")
                .unwrap_or(DEFAULT_RETRY_DELAY_MS),
            request_timeout_secs: env_parsed("MEETDESK_REQUEST_TIMEOUT")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            recognizer,
            log_level: env::var("MEETDESK_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl AssistantConfig {
    /// Environment defaults, overlaid by `path` when given, then validated
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.apply(ConfigFile::from_path(path)?);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides every field the file sets
    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(v) = file.mongodb_uri {
            self.mongodb_uri = v;
        }
        if let Some(v) = file.database {
            self.database = v;
        }
        if let Some(v) = file.collection {
            self.collection = v;
        }
        if let Some(v) = file.store_timeout_secs {
            self.store_timeout_secs = v;
        }
        if let Some(v) = file.clients_file {
            self.clients_file = Some(v);
        }
        if let Some(v) = file.ollama_endpoint {
            self.ollama_endpoint = normalize_endpoint(&v);
        }
        if let Some(v) = file.models {
            self.models = v;
        }
        if let Some(v) = file.match_threshold {
            self.match_threshold = v;
        }
        if let Some(v) = file.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file.retry_delay_ms {
            self.retry_delay_ms = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file.recognizer {
            self.recognizer = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v.to_lowercase();
        }
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.match_threshold > 100 {
            return Err(ConfigError::ValidationFailed(format!(
                "Match threshold must be between 0 and 100, got {}",
                self.match_threshold
            )));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max retries must be at least 1".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.store_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Store timeout must be at least 1 second".to_string(),
            ));
        }

        if self.models.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "At least one model must be configured".to_string(),
            ));
        }

        if self.ollama_endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Ollama endpoint cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_delay_ms),
            self.request_timeout(),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("mongodb_uri".to_string(), self.mongodb_uri.clone());
        map.insert("database".to_string(), self.database.clone());
        map.insert("collection".to_string(), self.collection.clone());
        map.insert(
            "store_timeout_secs".to_string(),
            self.store_timeout_secs.to_string(),
        );
        if let Some(ref file) = self.clients_file {
            map.insert("clients_file".to_string(), file.display().to_string());
        }
        map.insert("ollama_endpoint".to_string(), self.ollama_endpoint.clone());
        map.insert("models".to_string(), self.models.join(","));
        map.insert(
            "match_threshold".to_string(),
            self.match_threshold.to_string(),
        );
        map.insert("max_retries".to_string(), self.max_retries.to_string());
        map.insert("retry_delay_ms".to_string(), self.retry_delay_ms.to_string());
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert("recognizer".to_string(), self.recognizer.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Meetdesk Configuration:")?;
        match self.clients_file {
            Some(ref file) => writeln!(f, "  Client Store: file {}", file.display())?,
            None => writeln!(
                f,
                "  Client Store: {} ({}/{})",
                self.mongodb_uri, self.database, self.collection
            )?,
        }
        writeln!(f, "  Ollama Endpoint: {}", self.ollama_endpoint)?;
        writeln!(f, "  Models: {}", self.models.join(", "))?;
        writeln!(f, "  Match Threshold: {}", self.match_threshold)?;
        writeln!(
            f,
            "  Retries: {} x {}s (delay {}ms)",
            self.max_retries, self.request_timeout_secs, self.retry_delay_ms
        )?;
        writeln!(f, "  Recognizer: {}", self.recognizer)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    const KEYS: &[&str] = &[
        "MEETDESK_MONGODB_URI",
        "MEETDESK_DATABASE",
        "MEETDESK_COLLECTION",
        "MEETDESK_STORE_TIMEOUT",
        "MEETDESK_CLIENTS_FILE",
        "MEETDESK_OLLAMA_ENDPOINT",
        "OLLAMA_HOST",
        "MEETDESK_MODELS",
        "MEETDESK_MATCH_THRESHOLD",
        "MEETDESK_MAX_RETRIES",
        "MEETDESK_RETRY_DELAY_MS",
        "MEETDESK_REQUEST_TIMEOUT",
        "MEETDESK_RECOGNIZER",
        "MEETDESK_LOG_LEVEL",
    ];

    fn clean_env() -> Vec<EnvGuard> {
        KEYS.iter().map(|k| EnvGuard::unset(k)).collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = AssistantConfig::default();

        assert_eq!(config.mongodb_uri, DEFAULT_MONGODB_URI);
        assert_eq!(config.database, "meeting_scheduling");
        assert_eq!(config.collection, "clients");
        assert_eq!(config.ollama_endpoint, DEFAULT_OLLAMA_ENDPOINT);
        assert_eq!(config.models, vec!["gemma:2b", "llama2", "mistral"]);
        assert_eq!(config.match_threshold, 90);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30))
        );
        assert_eq!(config.recognizer, RecognizerKind::Rules);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("OLLAMA_HOST", "127.0.0.1:11500"),
            EnvGuard::set("MEETDESK_MODELS", " mistral , ,llama2:13b"),
            EnvGuard::set("MEETDESK_MATCH_THRESHOLD", "85"),
            EnvGuard::set("MEETDESK_MAX_RETRIES", "5"),
            EnvGuard::set("MEETDESK_RECOGNIZER", "LLM"),
            EnvGuard::set("MEETDESK_LOG_LEVEL", "DEBUG"),
        ];

        let config = AssistantConfig::default();

        assert_eq!(config.ollama_endpoint, "http://127.0.0.1:11500");
        assert_eq!(config.models, vec!["mistral", "llama2:13b"]);
        assert_eq!(config.match_threshold, 85);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.recognizer, RecognizerKind::Llm);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_explicit_endpoint_beats_ollama_host() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("OLLAMA_HOST", "other:1"),
            EnvGuard::set("MEETDESK_OLLAMA_ENDPOINT", "https://llm.internal"),
        ];

        assert_eq!(AssistantConfig::default().ollama_endpoint, "https://llm.internal");
    }

    #[test]
    #[serial]
    fn test_unparseable_env_values_fall_back() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("MEETDESK_MATCH_THRESHOLD", "high"),
            EnvGuard::set("MEETDESK_RECOGNIZER", "spacy"),
        ];

        let config = AssistantConfig::default();
        assert_eq!(config.match_threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(config.recognizer, RecognizerKind::Rules);
    }

    #[test]
    #[serial]
    fn test_validation_rules() {
        let _clean = clean_env();
        let base = AssistantConfig::default();

        let mut config = base.clone();
        config.match_threshold = 101;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.request_timeout_secs = 601;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.models = vec![" ".to_string()];
        assert!(config.validate().is_err());

        let mut config = base;
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_file_overlay() {
        let file = ConfigFile::parse(
            r#"
                models = ["llama2"]
                match_threshold = 80
                recognizer = "llm"
                ollama_endpoint = "gpu-box:11434"
            "#,
            "inline",
        )
        .unwrap();

        let mut config = AssistantConfig {
            models: vec!["gemma:2b".to_string()],
            ..AssistantConfig::default()
        };
        config.apply(file);

        assert_eq!(config.models, vec!["llama2"]);
        assert_eq!(config.match_threshold, 80);
        assert_eq!(config.recognizer, RecognizerKind::Llm);
        assert_eq!(config.ollama_endpoint, "http://gpu-box:11434");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = ConfigFile::parse("match_treshold = 80", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("match_treshold"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigFile::from_path(Path::new("/nonexistent/meetdesk.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _clean = clean_env();
        let config = AssistantConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("Meetdesk Configuration:"));
        assert!(display.contains("gemma:2b"));
        assert_eq!(
            config.to_display_map().get("match_threshold").map(String::as_str),
            Some("90")
        );
    }
}
