//! Structured error types for the aggregation pipeline.
//!
//! Every stage returns [`AggregationResult`] so callers can match on the
//! specific failure instead of string-sniffing.

/// Errors raised by record adaptation and the statistical stages.
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    /// A field the operation requires is absent.
    #[error("Missing field `{field}` ({context})")]
    MissingField { field: String, context: String },

    /// A field is present but cannot be interpreted.
    #[error("Invalid value for `{field}`: {value:?} ({reason})")]
    InvalidField {
        field: String,
        value: String,
        reason: String,
    },

    /// A statistic was requested over zero valid records.
    #[error("{stage}: population has no valid records")]
    EmptyPopulation { stage: &'static str },

    /// Expected chance agreement is 1, so kappa is undefined.
    #[error("{stage}: every one of {total_records} votes has the same answer, kappa is undefined")]
    DegenerateAgreement {
        stage: &'static str,
        total_records: usize,
    },
}

impl AggregationError {
    pub(crate) fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub(crate) fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for aggregation operations.
pub type AggregationResult<T> = Result<T, AggregationError>;
