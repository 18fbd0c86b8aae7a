//! Process-wide cache of values built from step state.
//!
//! Keyed by [`StateKey`], so steps that were configured identically share
//! one built value (e.g. one compiled regex), however many times the
//! pipeline is constructed. Passed around explicitly as an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::core::state::StateKey;
use crate::error::StepError;
use crate::step::FormatterFunc;

type Slot<V> = Arc<Mutex<Option<Arc<V>>>>;

/// At most one value is ever built per key, even under concurrent access.
/// Different keys never wait on each other.
pub struct StateCache<V: ?Sized> {
    entries: Mutex<HashMap<StateKey, Slot<V>>>,
}

/// Formatting functions shared between equal steps.
pub type FuncCache = StateCache<dyn FormatterFunc>;

impl<V: ?Sized> StateCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the value for `key`, building it with `build` if absent.
    ///
    /// A failed build leaves the entry empty.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &StateKey,
        build: impl FnOnce() -> Result<Arc<V>, E>,
    ) -> Result<Arc<V>, E> {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(key.clone()).or_default())
        };
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }
        debug!(key = %key.digest(), "building cached value");
        let value = build()?;
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Number of keys holding a built value.
    pub fn len(&self) -> usize {
        self.drain_values(false).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.drain_values(true);
    }

    fn drain_values(&self, remove: bool) -> Vec<Arc<V>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let values = entries
            .values()
            .filter_map(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_ref()
                    .map(Arc::clone)
            })
            .collect();
        if remove {
            entries.clear();
        }
        values
    }
}

impl FuncCache {
    /// Close every cached function, then forget them all.
    ///
    /// Every function gets closed; the first failure is returned.
    pub fn close_and_clear(&self) -> Result<(), StepError> {
        let mut first = None;
        for func in self.drain_values(true) {
            if let Err(err) = func.close() {
                debug!(error = %err, "cached function failed to close");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<V: ?Sized> Default for StateCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
