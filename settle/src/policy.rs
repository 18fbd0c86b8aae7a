//! What to do when a step fails on a file.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StepFailure;

/// Decides whether a step failure aborts the run.
pub trait ExceptionPolicy: Send + Sync {
    /// `Ok` tolerates the failure, `Err` aborts with it.
    fn handle(&self, failure: &StepFailure) -> Result<(), StepFailure>;
}

/// Abort on every failure, except for listed steps or paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrictPolicy {
    pub exclude_steps: BTreeSet<String>,
    /// Relative paths, `/` separated.
    pub exclude_paths: BTreeSet<String>,
}

impl ExceptionPolicy for StrictPolicy {
    fn handle(&self, failure: &StepFailure) -> Result<(), StepFailure> {
        if self.exclude_steps.contains(&failure.step) || self.exclude_paths.contains(&failure.path) {
            debug!(step = %failure.step, path = %failure.path, error = %failure.error, "tolerated excluded failure");
            Ok(())
        } else {
            Err(failure.clone())
        }
    }
}

/// Log every failure and carry on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogPolicy;

impl ExceptionPolicy for LogPolicy {
    fn handle(&self, failure: &StepFailure) -> Result<(), StepFailure> {
        warn!(step = %failure.step, path = %failure.path, error = %failure.error, "step failed");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    #[default]
    Strict,
    Log,
}

/// `[exceptions]` table of `settle.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionConfig {
    pub mode: PolicyMode,
    pub exclude_steps: BTreeSet<String>,
    pub exclude_paths: BTreeSet<String>,
}

impl ExceptionConfig {
    pub fn policy(&self) -> Box<dyn ExceptionPolicy> {
        match self.mode {
            PolicyMode::Strict => Box::new(StrictPolicy {
                exclude_steps: self.exclude_steps.clone(),
                exclude_paths: self.exclude_paths.clone(),
            }),
            PolicyMode::Log => Box::new(LogPolicy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;

    fn failure(step: &str, path: &str) -> StepFailure {
        StepFailure {
            step: step.to_string(),
            path: path.to_string(),
            error: StepError::failed("failed", "nope"),
        }
    }

    #[test]
    fn strict_aborts_by_default() {
        let policy = StrictPolicy::default();
        assert_eq!(policy.handle(&failure("a", "x.txt")), Err(failure("a", "x.txt")));
    }

    #[test]
    fn strict_tolerates_excluded() {
        let policy = StrictPolicy {
            exclude_steps: BTreeSet::from(["slow".to_string()]),
            exclude_paths: BTreeSet::from(["gen/out.txt".to_string()]),
        };
        assert!(policy.handle(&failure("slow", "x.txt")).is_ok());
        assert!(policy.handle(&failure("fast", "gen/out.txt")).is_ok());
        assert!(policy.handle(&failure("fast", "x.txt")).is_err());
    }

    #[test]
    fn log_never_aborts() {
        assert!(LogPolicy.handle(&failure("a", "b")).is_ok());
    }

    #[test]
    fn config_selects_policy() {
        let strict = ExceptionConfig::default().policy();
        assert!(strict.handle(&failure("a", "b")).is_err());
        let log = ExceptionConfig {
            mode: PolicyMode::Log,
            ..ExceptionConfig::default()
        };
        assert!(log.policy().handle(&failure("a", "b")).is_ok());
    }
}
