//! Error types for estimation, matching and catalog loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for vramfit-core operations.
pub type Result<T> = std::result::Result<T, FitError>;

#[derive(Debug, Error)]
pub enum FitError {
    /// A numeric input is zero, negative, non-finite or out of range.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    /// Strict quantization lookup failed. The estimator path falls back to
    /// 16 bits instead of returning this.
    #[error("unknown quantization code '{code}'")]
    UnknownQuantization { code: String },

    #[error("no model preset named '{name}'")]
    UnknownModel { name: String },

    #[error("failed to parse catalog: {source}")]
    CatalogParse {
        #[from]
        source: serde_json::Error,
    },

    #[error("failed to read catalog {}: {source}", path.display())]
    CatalogIo {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FitError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        FitError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field for `InvalidParameter`, `None` otherwise.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            FitError::InvalidParameter { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// Reject zero counts. Used for every integer shape/size input.
pub(crate) fn require_nonzero(field: &'static str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(FitError::invalid(field, "must be a positive integer"));
    }
    Ok(())
}

/// Reject non-finite and non-positive floats.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FitError::invalid(
            field,
            format!("must be a positive finite number, got {}", value),
        ));
    }
    Ok(())
}

/// Reject non-finite and negative floats. Zero is allowed.
pub(crate) fn require_non_negative(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(FitError::invalid(
            field,
            format!("must be a non-negative finite number, got {}", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_names_field() {
        let err = require_nonzero("layers", 0).unwrap_err();
        assert_eq!(err.field(), Some("layers"));
        assert!(err.to_string().contains("`layers`"));
    }

    #[test]
    fn test_require_positive_rejects_nan_and_zero() {
        assert!(require_positive("x", f64::NAN).is_err());
        assert!(require_positive("x", 0.0).is_err());
        assert!(require_positive("x", -1.0).is_err());
        assert!(require_positive("x", f64::INFINITY).is_err());
        assert!(require_positive("x", 0.5).is_ok());
    }

    #[test]
    fn test_require_non_negative_allows_zero() {
        assert!(require_non_negative("x", 0.0).is_ok());
        assert!(require_non_negative("x", -0.1).is_err());
    }

    #[test]
    fn test_unknown_quantization_message() {
        let err = FitError::UnknownQuantization {
            code: "FP12".to_string(),
        };
        assert_eq!(err.to_string(), "unknown quantization code 'FP12'");
        assert_eq!(err.field(), None);
    }
}
