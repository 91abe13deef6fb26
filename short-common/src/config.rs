//! Configuration management for the short-term decision tools.
//!
//! The tools share a single configuration file at `~/.short-decision/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (SHORT_DECISION_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SHORT_DECISION_LOG_LEVEL` → observability.log_level
//! - `SHORT_DECISION_LOG_FORMAT` → observability.log_format
//! - `SHORT_DECISION_DEBUG` → decision.debug (`1`, `true`, `yes`, `on`)
//! - `SHORT_DECISION_SNAPSHOT` → data.snapshot_path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that switches on debug payloads.
pub const DEBUG_ENV: &str = "SHORT_DECISION_DEBUG";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".short-decision"),
        |dirs| dirs.home_dir().join(".short-decision"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Interpret a truthy flag value (`1`, `true`, `yes`, `on`).
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Resolve the debug flag: an explicit `true` wins, otherwise the
/// `SHORT_DECISION_DEBUG` environment variable decides.
pub fn resolve_debug(debug: bool) -> bool {
    if debug {
        return true;
    }
    std::env::var(DEBUG_ENV).map(|v| is_truthy(&v)).unwrap_or(false)
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Scoring, classification and risk policy settings
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Market data source settings
    #[serde(default)]
    pub data: DataConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration (explicit path or default) with environment overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SHORT_DECISION_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("SHORT_DECISION_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(raw) = std::env::var(DEBUG_ENV) {
            if is_truthy(&raw) {
                self.decision.debug = true;
            }
        }
        if let Ok(path) = std::env::var("SHORT_DECISION_SNAPSHOT") {
            if !path.trim().is_empty() {
                self.data.snapshot_path = Some(path);
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }
        let path = config_path();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to hold at `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Decision
// ============================================================================

/// Sub-score weights as they appear in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_sentiment_weight")]
    pub sentiment: f64,
    #[serde(default = "default_sector_weight")]
    pub sector_strength: f64,
    #[serde(default = "default_volume_weight")]
    pub volume_strength: f64,
    #[serde(default = "default_capital_weight")]
    pub capital_inflow: f64,
    #[serde(default = "default_technical_weight")]
    pub technical_structure: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl WeightsConfig {
    /// Built-in weights: 25% / 25% / 20% / 20% / 10%.
    pub const DEFAULT: Self = Self {
        sentiment: 0.25,
        sector_strength: 0.25,
        volume_strength: 0.20,
        capital_inflow: 0.20,
        technical_structure: 0.10,
    };

    /// Sum of all five weights.
    pub fn total(&self) -> f64 {
        self.sentiment
            + self.sector_strength
            + self.volume_strength
            + self.capital_inflow
            + self.technical_structure
    }

    /// Weights paired with their field names, in declaration order.
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("sentiment", self.sentiment),
            ("sector_strength", self.sector_strength),
            ("volume_strength", self.volume_strength),
            ("capital_inflow", self.capital_inflow),
            ("technical_structure", self.technical_structure),
        ]
    }
}

/// Scoring and risk policy configuration.
///
/// Every numeric knob is optional; unset values fall back to the built-in
/// policy when the decision crate builds its fusion and risk settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Sub-score weights
    #[serde(default)]
    pub weights: Option<WeightsConfig>,

    /// Composite score at or above which the action is SHORT_BUY
    #[serde(default)]
    pub short_buy_threshold: Option<f64>,

    /// Composite score at or above which the action is WATCHLIST
    #[serde(default)]
    pub watchlist_threshold: Option<f64>,

    /// Maximum capital per position (percentage)
    #[serde(default)]
    pub max_position_pct: Option<f64>,

    /// Stop loss percentage (negative)
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,

    /// Take profit percentage
    #[serde(default)]
    pub take_profit_pct: Option<f64>,

    /// Minimum sentiment score that still allows new entries
    #[serde(default)]
    pub min_entry_sentiment: Option<f64>,

    /// Number of sectors kept by the rotation scan
    #[serde(default)]
    pub sector_top_n: Option<usize>,

    /// Number of candidates kept by the strong-stock scan
    #[serde(default)]
    pub candidate_top_n: Option<usize>,

    /// Attach debug diagnostics to tool outputs
    #[serde(default)]
    pub debug: bool,
}

impl DecisionConfig {
    /// Built-in lower bound of SHORT_BUY.
    pub const DEFAULT_SHORT_BUY_THRESHOLD: f64 = 75.0;
    /// Built-in lower bound of WATCHLIST.
    pub const DEFAULT_WATCHLIST_THRESHOLD: f64 = 60.0;

    /// Configured thresholds as `(short_buy, watchlist)`, defaults filled in.
    pub fn thresholds(&self) -> (f64, f64) {
        (
            self.short_buy_threshold
                .unwrap_or(Self::DEFAULT_SHORT_BUY_THRESHOLD),
            self.watchlist_threshold
                .unwrap_or(Self::DEFAULT_WATCHLIST_THRESHOLD),
        )
    }
}

// ============================================================================
// Data
// ============================================================================

/// Market data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Path of a JSON market snapshot; without one the fallback data is used
    #[serde(default)]
    pub snapshot_path: Option<String>,

    /// Fall back to built-in reference data when the snapshot fails
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            fallback_enabled: true,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}
fn default_sentiment_weight() -> f64 {
    WeightsConfig::DEFAULT.sentiment
}
fn default_sector_weight() -> f64 {
    WeightsConfig::DEFAULT.sector_strength
}
fn default_volume_weight() -> f64 {
    WeightsConfig::DEFAULT.volume_strength
}
fn default_capital_weight() -> f64 {
    WeightsConfig::DEFAULT.capital_inflow
}
fn default_technical_weight() -> f64 {
    WeightsConfig::DEFAULT.technical_structure
}
