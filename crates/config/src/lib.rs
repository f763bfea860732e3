//! Configuration loading, validation, and management for domaineval.
//!
//! Loads configuration from `~/.domaineval/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use domaineval_core::{IdentityError, UserContext};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.domaineval/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine behavior
    #[serde(default)]
    pub engine: EngineConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Token claims used as the acting user by the CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,

    /// Named view rules checked by `domaineval validate`
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Result of `safe_evaluate` when an expression fails
    #[serde(default = "default_true")]
    pub safe_default: bool,

    /// Maximum bracket nesting
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Reject acting users that did not come from verified claims
    #[serde(default)]
    pub strict_user_context: bool,

    /// Entries kept by the in-memory diagnostics log
    #[serde(default = "default_diagnostics_capacity")]
    pub diagnostics_capacity: usize,
}

fn default_true() -> bool {
    true
}
fn default_max_depth() -> usize {
    64
}
fn default_diagnostics_capacity() -> usize {
    1_000
}

/// Upper bound accepted for `engine.max_depth`.
pub const MAX_DEPTH_LIMIT: usize = 256;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            safe_default: true,
            max_depth: default_max_depth(),
            strict_user_context: false,
            diagnostics_capacity: default_diagnostics_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::ValidationError(format!(
                "unknown log format '{other}' (expected pretty, compact or json)"
            ))),
        }
    }
}

/// The form attribute a rule's expression drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAttribute {
    Invisible,
    Readonly,
    Required,
    /// A relation-picker filter rather than a boolean gate
    Domain,
}

/// A domain expression attached to one field of one model's view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Unique name for this rule
    pub name: String,

    /// Model the view belongs to (e.g. `fleet.vehicle`)
    pub model: String,

    /// Field the expression is attached to
    pub field: String,

    pub attribute: RuleAttribute,

    /// The domain expression
    #[serde(default)]
    pub expression: String,

    /// Fields available on the model, for reference checks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    /// Whether this rule is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.domaineval/config.toml).
    ///
    /// Environment overrides:
    /// - `DOMAINEVAL_LOG_LEVEL`
    /// - `DOMAINEVAL_LOG_FORMAT`
    /// - `DOMAINEVAL_STRICT_USER`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&Self::config_path())
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".domaineval")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Apply overrides from `lookup` (the process environment in [`load`](Self::load)).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("DOMAINEVAL_LOG_LEVEL") {
            self.logging.level = level.to_ascii_lowercase();
        }
        if let Some(format) = lookup("DOMAINEVAL_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(strict) = lookup("DOMAINEVAL_STRICT_USER") {
            self.engine.strict_user_context = parse_flag("DOMAINEVAL_STRICT_USER", &strict)?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_depth == 0 || self.engine.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "engine.max_depth must be between 1 and {MAX_DEPTH_LIMIT}"
            )));
        }

        if self.engine.diagnostics_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "engine.diagnostics_capacity must be > 0".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if let Some(user) = &self.user {
            if !user.is_object() {
                return Err(ConfigError::ValidationError(
                    "[user] must be a table of token claims".into(),
                ));
            }
        }

        let mut names = HashSet::new();
        for rule in &self.rules {
            if rule.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "rule name cannot be empty".into(),
                ));
            }
            if rule.model.is_empty() || rule.field.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "rule '{}' needs both model and field",
                    rule.name
                )));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
        }

        Ok(())
    }

    /// The configured acting user, built from the `[user]` claims.
    pub fn acting_user(&self) -> Result<Option<UserContext>, ConfigError> {
        self.user
            .as_ref()
            .map(UserContext::from_claims)
            .transpose()
            .map_err(ConfigError::User)
    }

    /// Enabled rules only.
    pub fn active_rules(&self) -> impl Iterator<Item = &RuleConfig> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// Generate a default config TOML string (for `config show --defaults`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::ValidationError(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid [user] claims: {0}")]
    User(IdentityError),
}
