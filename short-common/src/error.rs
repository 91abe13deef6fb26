//! Error types for the short-term decision tools.

use thiserror::Error;

/// Result type alias using the shared error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the decision tools.
#[derive(Error, Debug)]
pub enum Error {
    /// A required score field is missing or is not a number.
    #[error("Input type error on `{field}`: {reason}")]
    InputType { field: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Market data source error
    #[error("Data source error: {0}")]
    DataSource(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build an input type error for a named field.
    pub fn input_type(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputType {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is an input type error (looks through context wrappers).
    pub fn is_input_type(&self) -> bool {
        match self {
            Self::InputType { .. } => true,
            Self::WithContext { source, .. } => source.is_input_type(),
            _ => false,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputType { .. } | Self::InvalidInput(_) => 2,
            Self::Config(_) => 3,
            Self::DataSource(_) => 4,
            Self::WithContext { source, .. } => source.exit_code(),
            _ => 1,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::input_type("sentiment", "missing").exit_code(), 2);
        assert_eq!(Error::InvalidInput("test".into()).exit_code(), 2);
        assert_eq!(Error::Config("test".into()).exit_code(), 3);
        assert_eq!(Error::DataSource("test".into()).exit_code(), 4);
    }

    #[test]
    fn test_input_type_through_context() {
        let err = Error::input_type("capital_inflow", "expected a number");
        let wrapped = err.with_context("parsing sub-scores");
        assert!(wrapped.is_input_type());
        assert_eq!(wrapped.exit_code(), 2);
        assert!(wrapped.to_string().contains("capital_inflow"));
    }

    #[test]
    fn test_result_ext_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = res.context("reading snapshot").unwrap_err();
        assert!(matches!(err, Error::WithContext { .. }));
        assert!(!err.is_input_type());
    }
}
