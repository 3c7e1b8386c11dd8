//! Engine error taxonomy.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`Initialization`](EngineError::Initialization) | `ENGINE_INIT_FAILED` | Yes |
//! | [`InitializationTimeout`](EngineError::InitializationTimeout) | `ENGINE_INIT_TIMEOUT` | Yes |
//! | [`Validation`](EngineError::Validation) | `VALIDATION_*` | No |
//! | [`RuntimeEvaluation`](EngineError::RuntimeEvaluation) | `RUNTIME_EVAL_FAILED` | No |
//! | [`EvaluationTimeout`](EngineError::EvaluationTimeout) | `RUNTIME_EVAL_TIMEOUT` | Yes |
//! | [`Decode`](EngineError::Decode) | `DECODE_FAILED` | No |
//!
//! Initialization failures leave the engine re-attemptable, so the next call may
//! succeed. Everything else describes a problem with the request or the data and is
//! reported exactly once.

use std::time::Duration;

use thiserror::Error;

use crate::i18n::Locale;

/// Top-level error returned by every engine and analysis call.
///
/// `Clone` because one initialization outcome is handed to every caller that
/// joined the same in-flight attempt.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Boot, package install or package load failed on every attempt.
    #[error("failed to initialize the R engine after {attempts} attempt(s): {message}")]
    Initialization { attempts: u32, message: String },

    /// Another caller's initialization did not finish within the wait bound.
    #[error("timed out after {waited:?} waiting for R engine initialization")]
    InitializationTimeout { waited: Duration },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The generated program signalled an error, or the interpreter went away mid-call.
    #[error("{procedure} failed in R: {message}")]
    RuntimeEvaluation { procedure: String, message: String },

    /// The engine was ready but the procedure did not finish within the caller's bound.
    #[error("{procedure} did not finish within {waited:?}")]
    EvaluationTimeout { procedure: String, waited: Duration },

    #[error("{procedure}: {source}")]
    Decode {
        procedure: String,
        #[source]
        source: DecodeError,
    },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Initialization { .. } => "ENGINE_INIT_FAILED",
            Self::InitializationTimeout { .. } => "ENGINE_INIT_TIMEOUT",
            Self::Validation(v) => v.code(),
            Self::RuntimeEvaluation { .. } => "RUNTIME_EVAL_FAILED",
            Self::EvaluationTimeout { .. } => "RUNTIME_EVAL_TIMEOUT",
            Self::Decode { .. } => "DECODE_FAILED",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Initialization { .. }
                | Self::InitializationTimeout { .. }
                | Self::EvaluationTimeout { .. }
        )
    }

    /// Message suitable for end users. Only validation errors are translated; other
    /// variants carry runtime text that is passed through unchanged.
    pub fn localized(&self, locale: Locale) -> String {
        match self {
            Self::Validation(v) => v.localized(locale),
            other => other.to_string(),
        }
    }
}

/// Pre-flight rejection of a request before any program is generated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{label}: the dataset is empty")]
    EmptyDataset { label: String },

    #[error("{label}: row {row} has {found} values, expected {expected}")]
    RaggedRows {
        label: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{label}: at least {required} variables are required, got {found}")]
    InsufficientVariables {
        label: String,
        required: usize,
        found: usize,
    },

    #[error("{label}: at least {required} complete observations are required, got {found}")]
    InsufficientObservations {
        label: String,
        required: usize,
        found: usize,
    },

    #[error("{label}: non-finite value in {column} at row {row}")]
    NonFiniteValue {
        label: String,
        column: String,
        row: usize,
    },

    #[error("{label}: {column} has zero variance")]
    ZeroVarianceColumn { label: String, column: String },

    #[error("{label}: {left} has {left_len} values but {right} has {right_len}")]
    LengthMismatch {
        label: String,
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },

    #[error("{label}: invalid {name}: {reason}")]
    InvalidParameter {
        label: String,
        name: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyDataset { .. } => "VALIDATION_EMPTY_DATASET",
            Self::RaggedRows { .. } => "VALIDATION_RAGGED_ROWS",
            Self::InsufficientVariables { .. } => "VALIDATION_INSUFFICIENT_VARIABLES",
            Self::InsufficientObservations { .. } => "VALIDATION_INSUFFICIENT_OBSERVATIONS",
            Self::NonFiniteValue { .. } => "VALIDATION_NON_FINITE_VALUE",
            Self::ZeroVarianceColumn { .. } => "VALIDATION_ZERO_VARIANCE",
            Self::LengthMismatch { .. } => "VALIDATION_LENGTH_MISMATCH",
            Self::InvalidParameter { .. } => "VALIDATION_INVALID_PARAMETER",
        }
    }

    pub fn localized(&self, locale: Locale) -> String {
        crate::i18n::validation_message(self, locale)
    }
}

/// A returned value did not have the shape its decoder expects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("field `{0}` is missing from the R result")]
    MissingField(String),

    #[error("field `{field}`: expected {expected}")]
    UnexpectedShape {
        field: String,
        expected: &'static str,
    },

    #[error("field `{field}`: {len} values cannot form a matrix with {rows} rows")]
    DimensionMismatch {
        field: String,
        len: usize,
        rows: usize,
    },
}

/// Failure reported by an [`Interpreter`](crate::process::Interpreter).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// R raised a condition (`stop()`, a library error, a parse error).
    #[error("{0}")]
    Signalled(String),

    /// The interpreter process died or spoke something other than the reply protocol.
    #[error("interpreter transport failure: {0}")]
    Transport(String),
}
