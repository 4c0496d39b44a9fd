//! Validation Errors

use thiserror::Error;

/// Errors raised while resolving a raw request into a [`PackagingSpecification`](super::PackagingSpecification).
///
/// Every variant names the offending field so callers can point the user at it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was omitted.
    #[error("{field} is required")]
    Missing {
        /// Field name, as it appears in the request
        field: &'static str,
    },

    /// A numeric field must be strictly positive.
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive {
        /// Field name, as it appears in the request
        field: &'static str,
        /// Offending value, rendered for display
        value: String,
    },

    /// An identifier did not match any known option.
    #[error("unknown {field} `{value}`")]
    UnknownOption {
        /// Field name, as it appears in the request
        field: &'static str,
        /// Unrecognised identifier
        value: String,
    },

    /// The field is present but its value cannot be used.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name, as it appears in the request
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },
}

impl ValidationError {
    /// Name of the field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field }
            | Self::NotPositive { field, .. }
            | Self::UnknownOption { field, .. }
            | Self::Invalid { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_is_reported_for_every_variant() {
        let errors = [
            ValidationError::Missing { field: "width" },
            ValidationError::NotPositive {
                field: "width",
                value: "0".to_string(),
            },
            ValidationError::UnknownOption {
                field: "width",
                value: "x".to_string(),
            },
            ValidationError::Invalid {
                field: "width",
                reason: "bad".to_string(),
            },
        ];

        for error in errors {
            assert_eq!(error.field(), "width", "unexpected field for {error}");
        }
    }

    #[test]
    fn messages_name_the_field() {
        let error = ValidationError::UnknownOption {
            field: "postProcessing",
            value: "laser-cut".to_string(),
        };

        assert_eq!(error.to_string(), "unknown postProcessing `laser-cut`");
    }
}
