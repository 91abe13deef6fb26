//! Short Common - shared configuration, errors and helpers for the A-share
//! short-term decision tools.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - Numeric helpers used by the scoring rules

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod numeric;
pub mod validation;

pub use config::{Config, DataConfig, DecisionConfig, ObservabilityConfig, WeightsConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{resolve_debug, Config, DecisionConfig};
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
