//! Error types returned by the formatting pipeline.
//!
//! Non-convergence is deliberately absent: it is a classification
//! ([`DirtyState::DidNotConverge`](crate::dirty::DirtyState)), not an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::lint::Lint;

/// Raw bytes that do not decode under the formatter's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EncodingError {
    /// Location plus decoding hints, see [`encoding_error_message`](crate::core::encoding::encoding_error_message).
    pub message: String,
}

/// A step's own failure, before any file or step context is attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// The step rejected its input.
    #[error("{message}")]
    Failed { code: String, message: String },

    /// The step found problems it can describe but not fix.
    #[error("{}", describe_lints(.0))]
    Lints(Vec<Lint>),

    /// The step's state could not be computed or encoded.
    #[error("unable to compute step state: {0}")]
    State(String),
}

impl StepError {
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        StepError::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Short identifier used when this error surfaces as a lint.
    pub fn code(&self) -> &str {
        match self {
            StepError::Failed { code, .. } => code,
            StepError::Lints(_) => "lints",
            StepError::State(_) => "state",
        }
    }
}

impl From<anyhow::Error> for StepError {
    fn from(err: anyhow::Error) -> Self {
        StepError::failed("error", format!("{err:#}"))
    }
}

fn describe_lints(lints: &[Lint]) -> String {
    match lints {
        [only] => only.detail().to_string(),
        _ => format!("{} problems found", lints.len()),
    }
}

/// A [`StepError`] with the step and file it happened in.
///
/// This is what an [`ExceptionPolicy`](crate::policy::ExceptionPolicy) gets to judge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{step}' failed on '{path}': {error}")]
pub struct StepFailure {
    pub step: String,
    /// Path relative to the formatter's root directory.
    pub path: String,
    #[source]
    pub error: StepError,
}

/// First failure raised while closing steps; the rest were only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to close step '{step}': {error}{}", more_failures(.additional))]
pub struct CloseError {
    pub step: String,
    #[source]
    pub error: StepError,
    /// Number of later steps that also failed to close.
    pub additional: usize,
}

fn more_failures(additional: &usize) -> String {
    if *additional == 0 {
        String::new()
    } else {
        format!(" (and {additional} more)")
    }
}

/// Umbrella error for formatting orchestration.
#[derive(Debug, Error)]
pub enum SettleError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Step(#[from] StepFailure),

    #[error(transparent)]
    Close(#[from] CloseError),

    /// Canonical bytes were requested from a state which has none.
    #[error("no canonical form: the file {0}")]
    NoCanonicalForm(&'static str),

    #[error("lint state was created with a different formatter ({expected} steps, found {actual})")]
    ForeignFormatter { expected: usize, actual: usize },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
