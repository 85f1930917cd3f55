//! Error types.
//!
//! Two layers:
//!
//! - [`PipelineError`]: the typed failures of the alignment/decomposition core.
//!   Every variant names the series, entity, or label it concerns.
//! - [`AppError`]: what the binary reports. It carries a process exit code and
//!   a human-readable message; pipeline failures map to exit code 3.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by the pure pipeline (normalize, reshape, merge, decompose).
///
/// All of these indicate structurally bad input for the entity/run they occur
/// in. None of them are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("series `{series}` has no known values to normalize")]
    InsufficientData { series: String },

    #[error("no rows remain after selecting indicator `{indicator}`")]
    EmptyIndicator { indicator: String },

    #[error("period column `{label}` is not a valid {expected} label")]
    MalformedPeriodLabel { label: String, expected: &'static str },

    #[error("series `{series}`: log1p is undefined for {value} at {date} (values must be > -1)")]
    InvalidDomain {
        series: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("series `{series}` has {got} points; period {period} needs at least {needed}")]
    InsufficientLength {
        series: String,
        got: usize,
        needed: usize,
        period: usize,
    },

    #[error("series `{series}` has a missing value at {date}; fill gaps before decomposing")]
    UnfilledGap { series: String, date: NaiveDate },

    #[error("entity `{entity}` appears more than once in the source table")]
    DuplicateEntity { entity: String },

    #[error("series `{series}`: timestamps must be strictly increasing (found {date} after {previous})")]
    UnorderedTimestamps {
        series: String,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("decomposition period must be >= 2 (got {period})")]
    InvalidPeriod { period: usize },
}

/// Shorthand used by the core modules.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Exit code used for structurally bad data.
pub const EXIT_BAD_DATA: u8 = 3;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(EXIT_BAD_DATA, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_bad_data_exit_code() {
        let err: AppError = PipelineError::EmptyIndicator {
            indicator: "Annual average inflation".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), EXIT_BAD_DATA);
        assert!(err.message().contains("Annual average inflation"));
    }

    #[test]
    fn messages_name_the_offending_series() {
        let err = PipelineError::InsufficientLength {
            series: "Brazil_infl".to_string(),
            got: 3,
            needed: 24,
            period: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("Brazil_infl"), "{msg}");
        assert!(msg.contains("24"), "{msg}");
    }
}
