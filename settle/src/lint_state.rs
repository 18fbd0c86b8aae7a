//! A file's dirty state together with the lints every step reported on it.

use std::path::Path;

use tracing::debug;

use crate::core::line_ending::to_unix;
use crate::core::lint::{Lint, LintSuppression};
use crate::core::value_per_step::ValuePerStep;
use crate::dirty::{Calculation, DirtyState};
use crate::error::{EncodingError, SettleError, StepError};
use crate::formatter::{Formatter, StepOutcome};

#[derive(Debug)]
pub struct LintState {
    dirty: DirtyState,
    lints: Option<ValuePerStep<Vec<Lint>>>,
    failures: ValuePerStep<StepError>,
}

impl LintState {
    /// Evaluate `raw` bytes of `file`.
    ///
    /// Step failures do not abort: they become lints on the failing step.
    /// Steps that did not fail lint the canonical text, or the original
    /// text when there is no canonical form to offer.
    pub fn of(formatter: &Formatter, file: &Path, raw: &[u8]) -> Result<Self, EncodingError> {
        let calculation = Calculation::new(formatter, file, raw)?;
        let steps = formatter.steps();
        let mut outcomes = ValuePerStep::new(steps.len());
        let (dirty, first_pass) = calculation.calculate_with_lint(&mut outcomes);

        let lint_text = match &dirty {
            DirtyState::Resolved(bytes) => to_unix(&formatter.encoding().decode(bytes)),
            DirtyState::Clean | DirtyState::DidNotConverge => calculation.unix().to_string(),
        };

        let mut lints = ValuePerStep::new(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if matches!(outcomes.get(i), Some(StepOutcome::Failed(_))) {
                continue;
            }
            match step.lint(&lint_text, file) {
                Ok(found) if found.is_empty() => {}
                Ok(found) => {
                    lints.set(i, found);
                }
                Err(error) => {
                    lints.set(i, Lint::from_step_error(&error));
                }
            }
        }

        // A stored failure describes the text the step saw during the first
        // pass. It still describes `lint_text` only if the first pass settled
        // on `lint_text` and no later step changed anything; otherwise the
        // step is re-run.
        let mut failures = ValuePerStep::new(steps.len());
        let mut unchanged_since = lint_text == first_pass;
        for (i, step) in steps.iter().enumerate().rev() {
            match outcomes.take(i) {
                Some(StepOutcome::Failed(stored)) => {
                    let error = if unchanged_since {
                        Some(stored)
                    } else {
                        step.format(&lint_text, file).err()
                    };
                    if let Some(error) = error {
                        lints.set(i, Lint::from_step_error(&error));
                        failures.set(i, error);
                    }
                }
                Some(StepOutcome::Unchanged) => {}
                None => unchanged_since = false,
            }
        }

        Ok(Self::new(dirty, lints, failures))
    }

    fn new(
        dirty: DirtyState,
        lints: ValuePerStep<Vec<Lint>>,
        failures: ValuePerStep<StepError>,
    ) -> Self {
        let lints = lints.index_of_first_value().map(|_| lints);
        Self {
            dirty,
            lints,
            failures,
        }
    }

    pub fn dirty_state(&self) -> &DirtyState {
        &self.dirty
    }

    /// Clean, and nothing to report.
    pub fn is_clean(&self) -> bool {
        self.dirty.is_clean() && !self.has_lints()
    }

    pub fn has_lints(&self) -> bool {
        self.lints.is_some()
    }

    /// Steps that failed on this file, by index.
    pub fn step_failures(&self) -> impl Iterator<Item = (usize, &StepError)> {
        self.failures.iter()
    }

    /// Forget everything step `index` reported.
    pub fn without_step(mut self, index: usize) -> Self {
        self.failures.take(index);
        if let Some(lints) = self.lints.as_mut() {
            lints.take(index);
        }
        let lints = self.lints.take().unwrap_or_else(|| ValuePerStep::new(self.failures.len()));
        Self::new(self.dirty, lints, self.failures)
    }

    fn check_formatter(&self, formatter: &Formatter) -> Result<(), SettleError> {
        let expected = self.failures.len();
        let actual = formatter.steps().len();
        if expected == actual {
            Ok(())
        } else {
            Err(SettleError::ForeignFormatter { expected, actual })
        }
    }

    /// Lints grouped under the name of the step that reported them, in
    /// step order.
    pub fn lints_by_step(&self, formatter: &Formatter) -> Result<Vec<(String, Vec<Lint>)>, SettleError> {
        self.check_formatter(formatter)?;
        let Some(lints) = &self.lints else {
            return Ok(Vec::new());
        };
        Ok(lints
            .iter()
            .map(|(i, found)| (formatter.steps()[i].name().to_string(), found.clone()))
            .collect())
    }

    /// Drop every lint matched by one of `suppressions`.
    pub fn with_removed_suppressions(
        mut self,
        formatter: &Formatter,
        relative_path: &str,
        suppressions: &[LintSuppression],
    ) -> Result<Self, SettleError> {
        self.check_formatter(formatter)?;
        let Some(mut lints) = self.lints.take() else {
            return Ok(self);
        };
        let indices: Vec<usize> = lints.iter().map(|(i, _)| i).collect();
        let mut kept = ValuePerStep::new(lints.len());
        for i in indices {
            let Some(found) = lints.take(i) else {
                continue;
            };
            let name = formatter.steps()[i].name();
            let before = found.len();
            let remaining: Vec<Lint> = found
                .into_iter()
                .filter(|lint| {
                    !suppressions
                        .iter()
                        .any(|suppression| suppression.suppresses(relative_path, name, lint))
                })
                .collect();
            if remaining.len() != before {
                debug!(step = name, path = relative_path, suppressed = before - remaining.len(), "suppressed lints");
            }
            if !remaining.is_empty() {
                kept.set(i, remaining);
            }
        }
        Ok(Self::new(self.dirty, kept, self.failures))
    }

    /// One line per lint, multi-line details cut to their first line.
    pub fn as_string_one_line(&self, file: &Path, formatter: &Formatter) -> Result<String, SettleError> {
        self.as_string(file, formatter, true)
    }

    /// One entry per lint, with full details.
    pub fn as_string_detailed(&self, file: &Path, formatter: &Formatter) -> Result<String, SettleError> {
        self.as_string(file, formatter, false)
    }

    fn as_string(&self, file: &Path, formatter: &Formatter, one_line: bool) -> Result<String, SettleError> {
        let relative = formatter.relative_path(file);
        let mut out = String::new();
        for (name, lints) in self.lints_by_step(formatter)? {
            for lint in lints {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&relative);
                out.push(':');
                lint.write_message(&mut out, &name, one_line);
            }
        }
        if out.is_empty() {
            out.push_str("(none)");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use crate::steps::forbid_regex;
    use crate::test_support::{failing_step, fn_step, formatter_with};

    const FILE: &str = "/project/src/a.txt";

    fn lint_state(fmt: &Formatter, raw: &str) -> LintState {
        LintState::of(fmt, Path::new(FILE), raw.as_bytes()).expect("lint state")
    }

    #[test]
    fn clean_file_without_lints() {
        let fmt = formatter_with(vec![Box::new(fn_step("id", str::to_string))]);
        let state = lint_state(&fmt, "fine\n");
        assert!(state.is_clean());
        assert!(!state.has_lints());
        assert_eq!(state.as_string_one_line(Path::new(FILE), &fmt).expect("render"), "(none)");
    }

    #[test]
    fn lints_see_the_canonical_text() {
        let fmt = formatter_with(vec![
            Box::new(fn_step("fix", |text| text.replace("TODO", "todo"))),
            Box::new(forbid_regex("no-todo", "todo", "found todo")),
        ]);
        let state = lint_state(&fmt, "a\nTODO\n");
        assert_eq!(state.dirty_state(), &DirtyState::Resolved(b"a\ntodo\n".to_vec()));
        assert_eq!(
            state.as_string_one_line(Path::new(FILE), &fmt).expect("render"),
            "src/a.txt:L2 no-todo(forbidden) found todo"
        );
    }

    #[test]
    fn failure_becomes_lint_with_guessed_line() {
        let fmt = formatter_with(vec![Box::new(failing_step("parse", "3: unexpected brace"))]);
        let state = lint_state(&fmt, "a\nb\n}\n");
        assert!(state.dirty_state().is_clean());
        assert!(!state.is_clean());
        let by_step = state.lints_by_step(&fmt).expect("by step");
        assert_eq!(by_step.len(), 1);
        assert_eq!(by_step[0].0, "parse");
        assert_eq!(by_step[0].1[0].line_start(), Some(3));
        assert_eq!(state.step_failures().count(), 1);
    }

    #[test]
    fn failure_is_rechecked_after_a_later_change() {
        let fmt = formatter_with(vec![
            Box::new(fn_step("dedupe", |text| text.replace("xx", "x"))),
            Box::new(crate::test_support::fails_on_step("strict", "bad", "found bad")),
            Box::new(fn_step("fix", |text| text.replace("bad", "good"))),
        ]);
        let state = lint_state(&fmt, "bad\n");
        assert_eq!(state.dirty_state(), &DirtyState::Resolved(b"good\n".to_vec()));
        assert!(!state.has_lints());
        assert_eq!(state.step_failures().count(), 0);
    }

    #[test]
    fn stored_failure_is_reused_when_nothing_changed_after() {
        let fmt = formatter_with(vec![
            Box::new(fn_step("fix", |text| text.replace("bad", "good"))),
            Box::new(crate::test_support::fails_on_step("strict", "good", "line 1 is good")),
        ]);
        let state = lint_state(&fmt, "bad\n");
        let by_step = state.lints_by_step(&fmt).expect("by step");
        assert_eq!(by_step[0].0, "strict");
        assert_eq!(by_step[0].1[0].line_start(), Some(1));
    }

    #[test]
    fn failure_is_rechecked_when_the_cell_settles_elsewhere() {
        let fmt = formatter_with(vec![
            Box::new(fn_step("shrink", |text| {
                let mut chars = text.chars();
                chars.next_back();
                chars.as_str().to_string()
            })),
            Box::new(crate::test_support::fails_on_step("strict", "CC", "found CC")),
        ]);
        let state = lint_state(&fmt, "CCC");
        assert_eq!(state.dirty_state(), &DirtyState::Resolved(Vec::new()));
        assert!(!state.has_lints());
        assert_eq!(state.step_failures().count(), 0);
    }

    #[test]
    fn suppressions_remove_matching_lints() {
        let fmt = formatter_with(vec![
            Box::new(forbid_regex("no-x", "x", "x found")),
            Box::new(forbid_regex("no-y", "y", "y found")),
        ]);
        let state = lint_state(&fmt, "x\ny\n");
        let suppress = LintSuppression {
            path: "src/a.txt".to_string(),
            step: "no-x".to_string(),
            short_code: "*".to_string(),
        };
        let state = state
            .with_removed_suppressions(&fmt, "src/a.txt", &[suppress])
            .expect("suppress");
        let by_step = state.lints_by_step(&fmt).expect("by step");
        assert_eq!(by_step.len(), 1);
        assert_eq!(by_step[0].0, "no-y");
    }

    #[test]
    fn suppressing_everything_leaves_no_lints() {
        let fmt = formatter_with(vec![Box::new(forbid_regex("no-x", "x", "x found"))]);
        let state = lint_state(&fmt, "x\n");
        let all = LintSuppression {
            path: "*".to_string(),
            step: "*".to_string(),
            short_code: "*".to_string(),
        };
        let state = state
            .with_removed_suppressions(&fmt, "src/a.txt", &[all])
            .expect("suppress");
        assert!(state.is_clean());
    }

    #[test]
    fn detailed_keeps_every_line() {
        let fmt = formatter_with(vec![Box::new(failing_step("boom", "first\nsecond"))]);
        let state = lint_state(&fmt, "x");
        assert_eq!(
            state.as_string_detailed(Path::new(FILE), &fmt).expect("render"),
            "src/a.txt:LINE_UNDEFINED boom(failed) first\nsecond"
        );
        assert_eq!(
            state.as_string_one_line(Path::new(FILE), &fmt).expect("render"),
            "src/a.txt:LINE_UNDEFINED boom(failed) first (...)"
        );
    }

    #[test]
    fn other_formatter_is_rejected() {
        let fmt = formatter_with(vec![Box::new(failing_step("boom", "nope"))]);
        let state = lint_state(&fmt, "x");
        let other = formatter_with(Vec::<Box<dyn Step>>::new());
        assert!(matches!(
            state.lints_by_step(&other),
            Err(SettleError::ForeignFormatter { expected: 1, actual: 0 })
        ));
    }

    #[test]
    fn without_step_forgets_its_failure() {
        let fmt = formatter_with(vec![Box::new(failing_step("boom", "nope"))]);
        let state = lint_state(&fmt, "x").without_step(0);
        assert!(state.is_clean());
        assert_eq!(state.step_failures().count(), 0);
    }
}
