//! Configuration management for the proctor engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed for {field}: {reason}")]
    ValidationError { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub rate_limit: RateLimitConfig,
    pub providers: ProvidersConfig,
    pub scoring: ScoringConfig,
    pub progression: ProgressionConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Admission pacing and budget-cap knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum seconds between admissions for one agent.
    pub cooldown_secs: u64,
    /// Global in-flight invocation cap.
    pub max_concurrent: u32,
    /// Hourly spend cap as a fraction of the monthly limit.
    pub max_hourly_fraction: f64,
    /// Daily spend cap as a fraction of the monthly limit.
    pub max_daily_fraction: f64,
    /// Target minimum average daily spend fraction; under-use below this
    /// activates the catch-up relaxation near month end.
    pub min_daily_fraction: f64,
    /// How many final days of the billing month count as the catch-up window.
    pub catchup_window_days: u32,
    /// Whether the catch-up relaxation is applied at all.
    pub catchup_enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            max_concurrent: 2,
            max_hourly_fraction: 0.005,
            max_daily_fraction: 0.08,
            min_daily_fraction: 0.02,
            catchup_window_days: 7,
            catchup_enabled: true,
        }
    }
}

/// One provider slot's account settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderAccountConfig {
    /// Backend label, e.g. "anthropic" or "openai".
    pub backend: String,
    /// API endpoint base URL.
    pub api_url: String,
    /// Model identifier passed to the backend.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Monthly token budget for this slot.
    pub monthly_token_limit: u64,
}

impl Default for ProviderAccountConfig {
    fn default() -> Self {
        Self {
            backend: "anthropic".to_string(),
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            monthly_token_limit: 140_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub primary: ProviderAccountConfig,
    pub secondary: ProviderAccountConfig,
    /// Primary usage fraction at or above which routing skips straight to
    /// the secondary.
    pub fallback_threshold: f64,
    /// Per-invocation timeout, seconds.
    pub invoke_timeout_secs: u64,
    /// Token estimate handed to admission and used as the generation cap.
    pub estimated_tokens_per_test: u32,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: ProviderAccountConfig::default(),
            secondary: ProviderAccountConfig {
                backend: "openai".to_string(),
                api_url: "https://api.openai.com/v1/chat/completions".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                monthly_token_limit: 9_000,
            },
            fallback_threshold: 0.95,
            invoke_timeout_secs: 45,
            estimated_tokens_per_test: 3000,
        }
    }
}

/// Scoring relief for struggling agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Consecutive failures at which the threshold relief kicks in.
    pub relief_after_failures: u32,
    /// Points subtracted from the base threshold under relief.
    pub relief_margin: u32,
    /// Threshold never drops below this.
    pub relief_floor: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            relief_after_failures: 5,
            relief_margin: 20,
            relief_floor: 50,
        }
    }
}

/// Leveling and promotion knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// XP needed per level; remainder carries forward on level-up.
    pub level_threshold: u64,
    /// Consecutive successes required for a difficulty promotion.
    pub promotion_streak: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            level_threshold: 1000,
            promotion_streak: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".proctor/proctor.db".to_string(),
            max_connections: 5,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new("proctor.toml");
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PROCTOR_DATABASE_PATH") {
            self.database.path = val;
        }
        if let Ok(val) = std::env::var("PROCTOR_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PROCTOR_COOLDOWN_SECS") {
            if let Ok(v) = val.parse() {
                self.rate_limit.cooldown_secs = v;
            }
        }
        if let Ok(val) = std::env::var("PROCTOR_MAX_CONCURRENT") {
            if let Ok(v) = val.parse() {
                self.rate_limit.max_concurrent = v;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.max_concurrent == 0 {
            return Err(ConfigError::ValidationError {
                field: "rate_limit.max_concurrent".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        for (field, value) in [
            ("rate_limit.max_hourly_fraction", self.rate_limit.max_hourly_fraction),
            ("rate_limit.max_daily_fraction", self.rate_limit.max_daily_fraction),
            ("rate_limit.min_daily_fraction", self.rate_limit.min_daily_fraction),
            ("providers.fallback_threshold", self.providers.fallback_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError {
                    field: field.to_string(),
                    reason: "must be between 0.0 and 1.0".to_string(),
                });
            }
        }
        if self.scoring.relief_floor > 100 {
            return Err(ConfigError::ValidationError {
                field: "scoring.relief_floor".to_string(),
                reason: "must be at most 100".to_string(),
            });
        }
        if self.progression.level_threshold == 0 {
            return Err(ConfigError::ValidationError {
                field: "progression.level_threshold".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
