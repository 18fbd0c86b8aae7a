//! The formatting pipeline: an ordered list of steps plus the encoding and
//! line-ending policy used to read and write files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::signature::relative_to;
use crate::cache::state_cache::FuncCache;
use crate::core::encoding::Encoding;
use crate::core::line_ending::{LineEndingPolicy, to_unix};
use crate::core::state::StateKey;
use crate::core::value_per_step::ValuePerStep;
use crate::error::{CloseError, SettleError, StepError, StepFailure};
use crate::step::Step;

/// What happened to a step during [`Formatter::compute_with_lint`].
///
/// A step that changed the text has no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Ran, and left the text as it was.
    Unchanged,
    Failed(StepError),
}

impl StepOutcome {
    pub fn error(&self) -> Option<&StepError> {
        match self {
            StepOutcome::Failed(err) => Some(err),
            StepOutcome::Unchanged => None,
        }
    }
}

pub struct Formatter {
    steps: Vec<Box<dyn Step>>,
    encoding: Encoding,
    line_endings: LineEndingPolicy,
    root_dir: PathBuf,
}

#[derive(Default)]
pub struct FormatterBuilder {
    steps: Vec<Box<dyn Step>>,
    encoding: Encoding,
    line_endings: LineEndingPolicy,
    root_dir: PathBuf,
}

impl FormatterBuilder {
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Box<dyn Step>>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn line_endings(mut self, policy: LineEndingPolicy) -> Self {
        self.line_endings = policy;
        self
    }

    /// Directory that file paths are made relative to in diagnostics.
    pub fn root_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_dir = root.into();
        self
    }

    pub fn build(self) -> Formatter {
        Formatter {
            steps: self.steps,
            encoding: self.encoding,
            line_endings: self.line_endings,
            root_dir: self.root_dir,
        }
    }
}

#[derive(Serialize)]
struct FormatterState<'a> {
    encoding: Encoding,
    line_endings: &'a LineEndingPolicy,
    steps: Vec<StepState<'a>>,
}

#[derive(Serialize)]
struct StepState<'a> {
    name: &'a str,
    state: Value,
}

impl Formatter {
    pub fn builder() -> FormatterBuilder {
        FormatterBuilder::default()
    }

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn line_endings(&self) -> &LineEndingPolicy {
        &self.line_endings
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// `file` relative to the root directory, with `/` separators.
    ///
    /// Files outside the root are shown as given.
    pub fn relative_path(&self, file: &Path) -> String {
        relative_to(&self.root_dir, file)
    }

    /// Apply every step in order to line-feed-only `unix` text.
    ///
    /// The first step failure aborts the pass.
    pub fn compute(&self, unix: &str, file: &Path) -> Result<String, StepFailure> {
        let mut text = unix.to_string();
        for step in &self.steps {
            match step.format(&text, file) {
                Ok(Some(formatted)) => text = to_unix(&formatted),
                Ok(None) => {}
                Err(error) => {
                    let failure = StepFailure {
                        step: step.name().to_string(),
                        path: self.relative_path(file),
                        error,
                    };
                    debug!(%failure, "step failed, aborting pass");
                    return Err(failure);
                }
            }
        }
        Ok(text)
    }

    /// Like [`compute`](Self::compute), but a failing step is recorded in
    /// `outcomes` and skipped, and the remaining steps still run.
    ///
    /// # Panics
    ///
    /// Panics if `outcomes` was not sized for this formatter.
    pub fn compute_with_lint(
        &self,
        unix: &str,
        file: &Path,
        outcomes: &mut ValuePerStep<StepOutcome>,
    ) -> String {
        assert_eq!(
            outcomes.len(),
            self.steps.len(),
            "outcomes sized for a different formatter"
        );
        let mut text = unix.to_string();
        for (i, step) in self.steps.iter().enumerate() {
            match step.format(&text, file) {
                Ok(Some(formatted)) => {
                    let formatted = to_unix(&formatted);
                    if formatted == text {
                        outcomes.set(i, StepOutcome::Unchanged);
                    } else {
                        text = formatted;
                    }
                }
                Ok(None) => {
                    outcomes.set(i, StepOutcome::Unchanged);
                }
                Err(error) => {
                    debug!(step = step.name(), path = %self.relative_path(file), %error, "step failed, continuing");
                    outcomes.set(i, StepOutcome::Failed(error));
                }
            }
        }
        text
    }

    /// Convert line-feed-only text to the line ending configured for `file`.
    pub fn compute_line_endings(&self, unix: &str, file: &Path) -> String {
        self.line_endings.apply(unix, file)
    }

    /// Canonical key over encoding, line endings, and every step's name and
    /// state, in order.
    pub fn cache_key(&self) -> Result<StateKey, StepError> {
        let steps = self
            .steps
            .iter()
            .map(|step| {
                let key = step.state_key()?;
                let state = serde_json::from_str(key.as_str())
                    .map_err(|err| StepError::State(format!("{}: {err}", step.name())))?;
                Ok(StepState {
                    name: step.name(),
                    state,
                })
            })
            .collect::<Result<Vec<_>, StepError>>()?;
        StateKey::encode(
            "formatter",
            &FormatterState {
                encoding: self.encoding,
                line_endings: &self.line_endings,
                steps,
            },
        )
    }

    /// Whether two formatters would produce identical output for any file.
    pub fn equivalent(&self, other: &Formatter) -> Result<bool, StepError> {
        Ok(self.cache_key()? == other.cache_key()?)
    }

    /// Close every step in order. All steps get closed even if some fail;
    /// the first failure is returned.
    pub fn close(&self) -> Result<(), CloseError> {
        let mut first: Option<CloseError> = None;
        for step in &self.steps {
            if let Err(error) = step.close() {
                warn!(step = step.name(), %error, "failed to close step");
                match first.as_mut() {
                    Some(earlier) => earlier.additional += 1,
                    None => {
                        first = Some(CloseError {
                            step: step.name().to_string(),
                            error,
                            additional: 0,
                        });
                    }
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}

/// A formatter that owns the [`FuncCache`] its steps were built through.
///
/// Closing the session closes every step, then every cached function.
/// A session dropped without [`close`](Self::close) closes both anyway and
/// logs any failure.
pub struct FormatterSession {
    formatter: Formatter,
    cache: Arc<FuncCache>,
    closed: bool,
}

impl FormatterSession {
    pub fn new(formatter: Formatter, cache: Arc<FuncCache>) -> Self {
        Self {
            formatter,
            cache,
            closed: false,
        }
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn close(mut self) -> Result<(), SettleError> {
        self.close_all()
    }

    fn close_all(&mut self) -> Result<(), SettleError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let steps = self.formatter.close();
        let cached = self.cache.close_and_clear().map_err(|error| CloseError {
            step: "cached functions".to_string(),
            error,
            additional: 0,
        });
        match (steps, cached) {
            (Err(mut first), Err(_)) => {
                first.additional += 1;
                Err(first.into())
            }
            (Err(first), Ok(())) | (Ok(()), Err(first)) => Err(first.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

impl Drop for FormatterSession {
    fn drop(&mut self) {
        if let Err(error) = self.close_all() {
            warn!(%error, "failed to close formatter session");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::core::line_ending::LineEnding;
    use crate::step::{FormatterFunc, StandardStep, text_func};
    use crate::test_support::{failing_step, replace_step};

    fn formatter(steps: Vec<Box<dyn Step>>) -> Formatter {
        Formatter::builder().root_dir("/project").steps(steps).build()
    }

    #[test]
    fn steps_run_in_order() {
        let fmt = formatter(vec![
            Box::new(replace_step("ab", "a", "b")),
            Box::new(replace_step("bc", "b", "c")),
        ]);
        assert_eq!(fmt.compute("aaa", Path::new("/project/x.txt")).expect("compute"), "ccc");
    }

    #[test]
    fn step_output_is_renormalized() {
        let crlf = StandardStep::create("crlf", "crlf", (), |_| {
            Ok(text_func(|text| Ok(text.replace('\n', "\r\n"))))
        });
        let fmt = formatter(vec![Box::new(crlf)]);
        assert_eq!(fmt.compute("a\nb\n", Path::new("x")).expect("compute"), "a\nb\n");
    }

    #[test]
    fn first_failure_aborts_with_context() {
        let fmt = formatter(vec![
            Box::new(failing_step("boom", "bad input")),
            Box::new(replace_step("ab", "a", "b")),
        ]);
        let failure = fmt
            .compute("a", Path::new("/project/src/x.txt"))
            .expect_err("failure");
        assert_eq!(failure.step, "boom");
        assert_eq!(failure.path, "src/x.txt");
    }

    #[test]
    fn compute_with_lint_records_outcomes() {
        let fmt = formatter(vec![
            Box::new(replace_step("noop", "z", "y")),
            Box::new(failing_step("boom", "bad input")),
            Box::new(replace_step("ab", "a", "b")),
        ]);
        let mut outcomes = ValuePerStep::new(3);
        let out = fmt.compute_with_lint("a", Path::new("x"), &mut outcomes);
        assert_eq!(out, "b");
        assert_eq!(outcomes.get(0), Some(&StepOutcome::Unchanged));
        assert!(matches!(outcomes.get(1), Some(StepOutcome::Failed(_))));
        assert_eq!(outcomes.get(2), None);
    }

    #[test]
    fn line_endings_follow_policy() {
        let fmt = Formatter::builder()
            .line_endings(LineEndingPolicy::uniform(LineEnding::Windows))
            .build();
        assert_eq!(fmt.compute_line_endings("a\nb\n", Path::new("x")), "a\r\nb\r\n");
    }

    #[test]
    fn equivalence_follows_configuration() {
        let a = formatter(vec![Box::new(replace_step("ab", "a", "b"))]);
        let b = formatter(vec![Box::new(replace_step("ab", "a", "b"))]);
        let c = formatter(vec![Box::new(replace_step("ab", "a", "c"))]);
        assert!(a.equivalent(&b).expect("a == b"));
        assert!(!a.equivalent(&c).expect("a != c"));

        let latin1 = Formatter::builder()
            .encoding(Encoding::Iso8859_1)
            .steps(vec![Box::new(replace_step("ab", "a", "b")) as Box<dyn Step>])
            .build();
        assert!(!a.equivalent(&latin1).expect("encoding differs"));
    }

    #[test]
    fn close_reports_first_failure_after_closing_all() {
        let fmt = formatter(vec![
            Box::new(crate::test_support::close_failing_step("first")),
            Box::new(replace_step("ok", "a", "b")),
            Box::new(crate::test_support::close_failing_step("second")),
        ]);
        let err = fmt.close().expect_err("close fails");
        assert_eq!(err.step, "first");
        assert_eq!(err.additional, 1);
    }

    struct CountsCloses(Arc<AtomicUsize>);

    impl FormatterFunc for CountsCloses {
        fn apply(&self, _unix: &str, _file: &Path) -> Result<Option<String>, StepError> {
            Ok(None)
        }

        fn close(&self) -> Result<(), StepError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn cached_session(closes: &Arc<AtomicUsize>) -> FormatterSession {
        let cache = Arc::new(FuncCache::new());
        let steps: Vec<Box<dyn Step>> = (0..2)
            .map(|_| {
                let closes = Arc::clone(closes);
                let step = StandardStep::create("counted", "counted", (), move |_| {
                    let func: Arc<dyn FormatterFunc> =
                        Arc::new(CountsCloses(Arc::clone(&closes)));
                    Ok(func)
                })
                .with_cache(Arc::clone(&cache));
                Box::new(step) as Box<dyn Step>
            })
            .collect();
        let fmt = formatter(steps);
        fmt.compute("a", Path::new("/project/x.txt")).expect("compute");
        FormatterSession::new(fmt, cache)
    }

    #[test]
    fn session_close_closes_cached_functions_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let session = cached_session(&closes);
        session.formatter().close().expect("steps close");
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        session.close().expect("session close");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_session_still_closes() {
        let closes = Arc::new(AtomicUsize::new(0));
        drop(cached_session(&closes));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_reports_step_close_failure() {
        let fmt = formatter(vec![Box::new(crate::test_support::close_failing_step("first"))]);
        let err = FormatterSession::new(fmt, Arc::new(FuncCache::new()))
            .close()
            .expect_err("close fails");
        assert!(matches!(err, SettleError::Close(CloseError { ref step, .. }) if step == "first"));
    }
}
