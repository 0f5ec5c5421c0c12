//! Unified error hierarchy for VitalRS
//!
//! Structured error types for the analytics engine. Note that a failed
//! sample-size gate is *not* an error anywhere in this crate: analyses that
//! lack data omit their finding and log at debug level. Errors are reserved
//! for malformed configuration and shape violations that would otherwise
//! produce silently wrong numbers.

use thiserror::Error;

/// Top-level error type for all VitalRS operations
#[derive(Debug, Error)]
pub enum VitalRsError {
    /// Input validation errors (bad date ranges, empty event names, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Statistical calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors (config persistence, snapshot loading in the CLI)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the statistics and detection primitives
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Paired-series input with differing lengths
    #[error("Mismatched input lengths in {calculation}: {left} vs {right}")]
    MismatchedLengths {
        calculation: String,
        left: usize,
        right: usize,
    },

    /// Invalid parameter value
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },

    /// Invalid date range (from after to)
    #[error("Invalid date range: {reason}")]
    InvalidDateRange { reason: String },
}

/// Result type alias for VitalRS operations
pub type Result<T> = std::result::Result<T, VitalRsError>;

impl VitalRsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VitalRsError::Validation(_) => ErrorSeverity::Warning,
            VitalRsError::Calculation(_) => ErrorSeverity::Error,
            VitalRsError::Configuration(_) => ErrorSeverity::Error,
            VitalRsError::Io(_) => ErrorSeverity::Error,
            VitalRsError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            VitalRsError::Calculation(CalculationError::MismatchedLengths {
                calculation, ..
            }) => {
                format!(
                    "The two series passed to {} do not line up. This is a bug in the caller, not a data problem.",
                    calculation
                )
            }
            VitalRsError::Configuration(reason) => {
                format!(
                    "Configuration problem: {}. Run `vitalrs config --reset` to restore defaults.",
                    reason
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = VitalRsError::Validation("empty event name".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = VitalRsError::Internal("test".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_user_messages() {
        let err = VitalRsError::Calculation(CalculationError::MismatchedLengths {
            calculation: "pearson".to_string(),
            left: 10,
            right: 9,
        });
        assert!(err.user_message().contains("do not line up"));
    }
}
