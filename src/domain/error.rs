//! Per-record and schema error types.

/// A raw record field that could not be coerced into its canonical form.
///
/// Every variant names the offending field so the rejection can be reported
/// back to the caller without echoing the (possibly sensitive) value into logs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("Invalid value for {field}; expected a number")]
    NotNumeric { field: &'static str },

    #[error("Invalid value for {field}; expected Yes/No")]
    InvalidFlag { field: &'static str },

    #[error("Invalid value for {field}; expected format 'SYS/DIA'")]
    BloodPressureFormat { field: &'static str },

    #[error("Invalid value for {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("Derived feature {column} is not finite; input values are too large")]
    NonFiniteFeature { column: String },

    #[error("No valid fields provided")]
    NoUpdatableFields,
}

impl ValidationError {
    /// Name of the field that failed validation, if the error concerns one.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Missing { field }
            | Self::NotNumeric { field }
            | Self::InvalidFlag { field }
            | Self::BloodPressureFormat { field }
            | Self::OutOfRange { field, .. } => Some(field),
            Self::NonFiniteFeature { .. } | Self::NoUpdatableFields => None,
        }
    }
}

/// The feature set cannot be laid out against the training columns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaMismatchError {
    #[error("training column list is empty")]
    EmptySchema,

    #[error("training column list contains duplicate column {0:?}")]
    DuplicateColumn(String),

    #[error("{artifact} expects {expected} columns, schema has {actual}")]
    Width {
        artifact: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{artifact} column {index} is {found:?}, schema expects {expected:?}")]
    ColumnName {
        artifact: &'static str,
        index: usize,
        expected: String,
        found: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let err = ValidationError::BloodPressureFormat {
            field: "blood_pressure",
        };
        assert!(err.to_string().contains("blood_pressure"));
        assert_eq!(err.field(), Some("blood_pressure"));

        let err = ValidationError::Missing { field: "age" };
        assert_eq!(err.to_string(), "age is required");
        assert_eq!(ValidationError::NoUpdatableFields.field(), None);
    }
}
