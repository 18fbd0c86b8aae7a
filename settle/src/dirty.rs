//! Deciding whether a file needs rewriting, and to what.

use std::path::Path;

use tracing::{debug, instrument};

use crate::core::encoding::encoding_error_message;
use crate::core::line_ending::to_unix;
use crate::core::padded_cell::PaddedCell;
use crate::core::value_per_step::ValuePerStep;
use crate::error::{EncodingError, SettleError, StepFailure};
use crate::formatter::{Formatter, StepOutcome};

/// Whether a file's bytes are already canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    /// The file should be replaced by these bytes.
    Resolved(Vec<u8>),
    /// The formatter never settled on a fixed point for this file.
    DidNotConverge,
}

impl DirtyState {
    /// Evaluate `raw` bytes of `file`, propagating the first step failure.
    pub fn of(formatter: &Formatter, file: &Path, raw: &[u8]) -> Result<Self, SettleError> {
        Ok(Calculation::new(formatter, file, raw)?.calculate()?)
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, DirtyState::Clean)
    }

    pub fn did_not_converge(&self) -> bool {
        matches!(self, DirtyState::DidNotConverge)
    }

    pub fn canonical_bytes(&self) -> Result<&[u8], SettleError> {
        match self {
            DirtyState::Resolved(bytes) => Ok(bytes),
            DirtyState::Clean => Err(SettleError::NoCanonicalForm("is already clean")),
            DirtyState::DidNotConverge => Err(SettleError::NoCanonicalForm("did not converge")),
        }
    }
}

/// One file, decoded and ready to be evaluated.
pub struct Calculation<'a> {
    formatter: &'a Formatter,
    file: &'a Path,
    raw: &'a [u8],
    unix: String,
}

impl<'a> Calculation<'a> {
    /// Decode `raw`, rejecting bytes that do not fit the formatter's
    /// encoding before any step runs.
    pub fn new(formatter: &'a Formatter, file: &'a Path, raw: &'a [u8]) -> Result<Self, EncodingError> {
        let decoded = formatter.encoding().decode(raw);
        if let Some(message) = encoding_error_message(&decoded, raw, formatter.encoding()) {
            return Err(EncodingError { message });
        }
        Ok(Self {
            formatter,
            file,
            raw,
            unix: to_unix(&decoded),
        })
    }

    /// The decoded content with `\n` line endings only.
    pub fn unix(&self) -> &str {
        &self.unix
    }

    #[instrument(skip_all, fields(path = %self.formatter.relative_path(self.file)))]
    pub fn calculate(&self) -> Result<DirtyState, StepFailure> {
        let once = self.formatter.compute(&self.unix, self.file)?;
        self.classify(once, |text| self.formatter.compute(text, self.file))
    }

    /// Like [`calculate`](Self::calculate), but step failures of the first
    /// pass are recorded in `outcomes` instead of propagated. Later passes
    /// treat a failing step as making no change.
    ///
    /// Also returns the text the first pass produced, which is what the
    /// recorded outcomes describe.
    #[instrument(skip_all, fields(path = %self.formatter.relative_path(self.file)))]
    pub fn calculate_with_lint(&self, outcomes: &mut ValuePerStep<StepOutcome>) -> (DirtyState, String) {
        let once = self
            .formatter
            .compute_with_lint(&self.unix, self.file, outcomes);
        let steps = self.formatter.steps().len();
        let classified: Result<DirtyState, std::convert::Infallible> = self.classify(once.clone(), |text| {
            let mut scratch = ValuePerStep::new(steps);
            Ok(self.formatter.compute_with_lint(text, self.file, &mut scratch))
        });
        match classified {
            Ok(state) => (state, once),
            Err(never) => match never {},
        }
    }

    fn classify<E>(
        &self,
        once: String,
        mut compute: impl FnMut(&str) -> Result<String, E>,
    ) -> Result<DirtyState, E> {
        let once_bytes = self.to_bytes(&once);
        if once_bytes == self.raw {
            return Ok(DirtyState::Clean);
        }

        let twice = compute(&once)?;
        if twice == once {
            return Ok(DirtyState::Resolved(once_bytes));
        }

        debug!("formatter is not idempotent, searching for a fixed point");
        let cell = PaddedCell::check(self.file, &self.unix, &mut compute)?;
        let Some(canonical) = cell.try_canonical() else {
            debug!(outcome = %cell.user_message(), "no fixed point");
            return Ok(DirtyState::DidNotConverge);
        };
        debug!(outcome = %cell.user_message(), "fixed point found");
        let canonical_bytes = self.to_bytes(canonical);
        if canonical_bytes == self.raw {
            Ok(DirtyState::Clean)
        } else {
            Ok(DirtyState::Resolved(canonical_bytes))
        }
    }

    fn to_bytes(&self, unix: &str) -> Vec<u8> {
        let text = self.formatter.compute_line_endings(unix, self.file);
        self.formatter.encoding().encode(&text)
    }
}
