//! Configuration validation.
//!
//! Ensures log settings are recognised, weights form a proper convex
//! combination and classification thresholds are ordered.

use thiserror::Error;

use crate::config::{Config, DecisionConfig, ObservabilityConfig};

/// Tolerance used when checking that weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = self.decision.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for DecisionConfig {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(weights) = &self.weights {
            for (name, weight) in weights.entries() {
                if !weight.is_finite() || weight < 0.0 {
                    return Err(ValidationError::InvalidValue {
                        field: format!("decision.weights.{name}"),
                        reason: format!("must be a non-negative number, got {weight}"),
                    });
                }
            }
            let total = weights.total();
            if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ValidationError::InvalidValue {
                    field: "decision.weights".into(),
                    reason: format!("must sum to 1.0, got {total}"),
                });
            }
        }

        let (short_buy, watchlist) = self.thresholds();
        if watchlist >= short_buy {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "watchlist_threshold ({watchlist}) must be below short_buy_threshold ({short_buy})"
                ),
            });
        }

        if let Some(max_pct) = self.max_position_pct {
            if !(0.0..=100.0).contains(&max_pct) {
                return Err(ValidationError::InvalidValue {
                    field: "decision.max_position_pct".into(),
                    reason: "must be between 0 and 100".into(),
                });
            }
        }

        if let Some(stop) = self.stop_loss_pct {
            if stop > 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: "decision.stop_loss_pct".into(),
                    reason: "must be zero or negative".into(),
                });
            }
        }

        Ok(())
    }
}
