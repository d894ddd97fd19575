//! Error types shared across the workspace.

use thiserror::Error;

/// Invalid or inconsistent configuration, detected before a run starts.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown drift scenario `{0}`")]
    UnknownScenario(String),

    #[error("invalid timestamp `{value}`: {reason}")]
    InvalidTimestamp { value: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures raised by classifiers.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("cannot fit on an empty batch")]
    EmptyBatch,

    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model has not been trained")]
    NotTrained,
}

/// Checks a value lies in `[lo, hi]`.
pub fn ensure_range(
    field: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{value} is outside [{lo}, {hi}]"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_range() {
        assert!(ensure_range("p", 0.5, 0.0, 1.0).is_ok());
        assert!(ensure_range("p", 1.5, 0.0, 1.0).is_err());
        assert!(ensure_range("p", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::invalid("window_minutes", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid value for `window_minutes`: must be positive"
        );
        let err = ModelError::DimensionMismatch {
            expected: 3,
            actual: 7,
        };
        assert!(err.to_string().contains("expected 3"));
    }
}
