//! Configuration and settings errors.

use thiserror::Error;

/// A settings value failed validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    /// Value outside its allowed range
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Offending field
        field: &'static str,
        /// Supplied value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },

    /// NaN or infinite value
    #[error("{field} must be finite")]
    NotFinite {
        /// Offending field
        field: &'static str,
    },

    /// Any other invalid value
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Config load error
#[derive(Debug, Clone, Error)]
pub enum ConfigLoadError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Parsed but failed validation
    #[error("Invalid config: {0}")]
    Invalid(#[from] SettingsError),
}

/// Check a float against an inclusive range.
pub(crate) fn check_range(
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> Result<(), SettingsError> {
    if !value.is_finite() {
        return Err(SettingsError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            field,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        });
    }
    Ok(())
}

/// Check an integer against an inclusive range.
pub(crate) fn check_count(
    field: &'static str,
    value: usize,
    min: usize,
    max: usize,
) -> Result<(), SettingsError> {
    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            field,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range("x", 0.5, 0.0, 1.0).is_ok());
        assert!(check_range("x", 0.0, 0.0, 1.0).is_ok());
        assert!(matches!(
            check_range("x", 1.5, 0.0, 1.0),
            Err(SettingsError::OutOfRange { field: "x", .. })
        ));
        assert_eq!(
            check_range("x", f32::NAN, 0.0, 1.0),
            Err(SettingsError::NotFinite { field: "x" })
        );
    }

    #[test]
    fn test_error_display() {
        let err = check_count("max_points", 0, 1, 50_000).unwrap_err();
        assert_eq!(err.to_string(), "max_points = 0 is outside [1, 50000]");
    }
}
