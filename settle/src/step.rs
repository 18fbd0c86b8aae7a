//! Formatting steps: named transformations whose behavior is derived from
//! serializable state.
//!
//! A [`StandardStep`] never stores its formatting function directly. It
//! stores the state the function is built from, so equal state means equal
//! behavior and the [`StateKey`] is a sound cache key.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use crate::cache::state_cache::FuncCache;
use crate::core::lint::Lint;
use crate::core::state::{LazyState, StateKey};
use crate::error::StepError;

/// The pure function a step's state turns into.
pub trait FormatterFunc: Send + Sync {
    /// Format line-feed-only `unix` text. `None` means "no change".
    fn apply(&self, unix: &str, file: &Path) -> Result<Option<String>, StepError>;

    fn lint(&self, _unix: &str, _file: &Path) -> Result<Vec<Lint>, StepError> {
        Ok(Vec::new())
    }

    /// Release anything held by the function. Called at most once.
    fn close(&self) -> Result<(), StepError> {
        Ok(())
    }
}

/// Adapts a plain text-to-text closure.
pub struct TextFunc<F>(pub F);

impl<F> FormatterFunc for TextFunc<F>
where
    F: Fn(&str) -> Result<String, StepError> + Send + Sync,
{
    fn apply(&self, unix: &str, _file: &Path) -> Result<Option<String>, StepError> {
        (self.0)(unix).map(Some)
    }
}

/// Shorthand for an `Arc`ed [`TextFunc`].
pub fn text_func<F>(f: F) -> Arc<dyn FormatterFunc>
where
    F: Fn(&str) -> Result<String, StepError> + Send + Sync + 'static,
{
    Arc::new(TextFunc(f))
}

/// A named unit of transformation, as the formatter sees it.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Canonical key of everything that determines this step's behavior.
    fn state_key(&self) -> Result<StateKey, StepError>;

    /// Format `unix` text. `Ok(None)` signals no change.
    fn format(&self, unix: &str, file: &Path) -> Result<Option<String>, StepError>;

    fn lint(&self, _unix: &str, _file: &Path) -> Result<Vec<Lint>, StepError> {
        Ok(Vec::new())
    }

    /// Release per-step resources. Safe to call more than once.
    fn close(&self) -> Result<(), StepError> {
        Ok(())
    }
}

type ToFunc<S> = Box<dyn Fn(&S) -> Result<Arc<dyn FormatterFunc>, StepError> + Send + Sync>;

/// A step built from lazily computed state `S`.
pub struct StandardStep<S> {
    name: String,
    state: LazyState<S>,
    to_func: ToFunc<S>,
    func: RwLock<Option<Arc<dyn FormatterFunc>>>,
    cache: Option<Arc<FuncCache>>,
}

impl<S> StandardStep<S>
where
    S: Serialize + Send + Sync + 'static,
{
    pub fn create<T>(name: impl Into<String>, kind: &str, state: S, to_func: T) -> Self
    where
        S: Clone,
        T: Fn(&S) -> Result<Arc<dyn FormatterFunc>, StepError> + Send + Sync + 'static,
    {
        Self::with_state(name, LazyState::new(kind, state), to_func)
    }

    /// Like [`create`](Self::create), but the state is only computed when
    /// first needed: by equality, or by the first format.
    pub fn create_lazy<F, T>(name: impl Into<String>, kind: &str, supplier: F, to_func: T) -> Self
    where
        F: Fn() -> Result<S, StepError> + Send + Sync + 'static,
        T: Fn(&S) -> Result<Arc<dyn FormatterFunc>, StepError> + Send + Sync + 'static,
    {
        Self::with_state(name, LazyState::lazy(kind, supplier), to_func)
    }

    fn with_state<T>(name: impl Into<String>, state: LazyState<S>, to_func: T) -> Self
    where
        T: Fn(&S) -> Result<Arc<dyn FormatterFunc>, StepError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            state,
            to_func: Box::new(to_func),
            func: RwLock::new(None),
            cache: None,
        }
    }

    /// Share built functions with every other step of equal state.
    ///
    /// Functions taken from the cache are owned by it: [`Step::close`] only
    /// lets go of this step's handle, and
    /// [`FuncCache::close_and_clear`] closes them.
    pub fn with_cache(mut self, cache: Arc<FuncCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn state(&self) -> Result<&S, StepError> {
        self.state.get()
    }

    fn func(&self) -> Result<Arc<dyn FormatterFunc>, StepError> {
        if let Some(func) = self.func.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(func));
        }
        let mut slot = self.func.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(func) = slot.as_ref() {
            return Ok(Arc::clone(func));
        }
        let state = self.state.get()?;
        let func = match &self.cache {
            Some(cache) => {
                cache.get_or_try_insert_with(self.state.key()?, || (self.to_func)(state))?
            }
            None => (self.to_func)(state)?,
        };
        debug!(step = %self.name, "built formatter function");
        *slot = Some(Arc::clone(&func));
        Ok(func)
    }
}

impl<S> Step for StandardStep<S>
where
    S: Serialize + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn state_key(&self) -> Result<StateKey, StepError> {
        self.state.key().cloned()
    }

    fn format(&self, unix: &str, file: &Path) -> Result<Option<String>, StepError> {
        self.func()?.apply(unix, file)
    }

    fn lint(&self, unix: &str, file: &Path) -> Result<Vec<Lint>, StepError> {
        self.func()?.lint(unix, file)
    }

    fn close(&self) -> Result<(), StepError> {
        let func = self
            .func
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match func {
            Some(func) if self.cache.is_none() => func.close(),
            _ => Ok(()),
        }
    }
}

static NONCE: AtomicU64 = AtomicU64::new(0);

/// A step that is equal to no other step, so it is never considered up to
/// date by a build cache.
pub fn never_up_to_date(name: impl Into<String>, func: Arc<dyn FormatterFunc>) -> StandardStep<u64> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos() as u64);
    let nonce = nanos ^ NONCE.fetch_add(1, Ordering::Relaxed).rotate_left(48);
    StandardStep::create(name, "never-up-to-date", nonce, move |_| Ok(Arc::clone(&func)))
}

/// Restricts a step to files with one of the given extensions.
pub struct FilterByFile {
    step: Box<dyn Step>,
    extensions: BTreeSet<String>,
}

#[derive(Serialize)]
struct FilterState<'a> {
    extensions: &'a BTreeSet<String>,
    step: &'a str,
}

/// Wrap `step` so it only formats and lints files whose extension is in
/// `extensions` (without the leading dot, case-sensitive).
pub fn filter_by_file<I, E>(step: Box<dyn Step>, extensions: I) -> FilterByFile
where
    I: IntoIterator<Item = E>,
    E: Into<String>,
{
    FilterByFile {
        step,
        extensions: extensions.into_iter().map(Into::into).collect(),
    }
}

impl FilterByFile {
    fn applies_to(&self, file: &Path) -> bool {
        file.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(ext))
    }
}

impl Step for FilterByFile {
    fn name(&self) -> &str {
        self.step.name()
    }

    fn state_key(&self) -> Result<StateKey, StepError> {
        let inner = self.step.state_key()?;
        StateKey::encode(
            "filter-by-file",
            &FilterState {
                extensions: &self.extensions,
                step: inner.as_str(),
            },
        )
    }

    fn format(&self, unix: &str, file: &Path) -> Result<Option<String>, StepError> {
        if self.applies_to(file) {
            self.step.format(unix, file)
        } else {
            Ok(None)
        }
    }

    fn lint(&self, unix: &str, file: &Path) -> Result<Vec<Lint>, StepError> {
        if self.applies_to(file) {
            self.step.lint(unix, file)
        } else {
            Ok(Vec::new())
        }
    }

    fn close(&self) -> Result<(), StepError> {
        self.step.close()
    }
}
