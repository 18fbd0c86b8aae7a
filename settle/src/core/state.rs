//! Lazily computed step state and the canonical key derived from it.
//!
//! Two steps are interchangeable for caching purposes exactly when their
//! [`StateKey`]s are equal. A key is the canonical JSON encoding of
//! `{"kind": .., "state": ..}`: object keys sorted, no whitespace. It never
//! depends on identity, captured closures, or inputs that were only used to
//! compute the state (such as an absolute path the state was read from).

use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::error::StepError;

/// Canonical, deterministic encoding of a step's state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    /// Encode `state` tagged with the step `kind`.
    ///
    /// Fails when the state cannot be represented, e.g. a map with
    /// non-string keys.
    pub fn encode<S: Serialize + ?Sized>(kind: &str, state: &S) -> Result<Self, StepError> {
        let value = serde_json::to_value(state)
            .map_err(|err| StepError::State(format!("{kind}: {err}")))?;
        let tagged = json!({ "kind": kind, "state": value });
        Ok(StateKey(tagged.to_string()))
    }

    /// Decode the state back out of a key produced for `kind`.
    pub fn decode<S: DeserializeOwned>(&self, kind: &str) -> Result<S, StepError> {
        let mut tagged: Value = serde_json::from_str(&self.0)
            .map_err(|err| StepError::State(format!("{kind}: {err}")))?;
        let found = tagged.get("kind").and_then(Value::as_str).unwrap_or_default();
        if found != kind {
            return Err(StepError::State(format!(
                "expected state of kind '{kind}', found '{found}'"
            )));
        }
        let state = tagged.get_mut("state").map(Value::take).unwrap_or(Value::Null);
        serde_json::from_value(state).map_err(|err| StepError::State(format!("{kind}: {err}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// SHA-256 of the encoding, hex encoded.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.as_bytes()))
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Supplier<S> = Box<dyn Fn() -> Result<S, StepError> + Send + Sync>;

struct Computed<S> {
    state: S,
    key: StateKey,
}

/// State computed at most once, on first access, from any thread.
///
/// A failed computation is not cached; the next access tries again. Once
/// the state exists the supplier is dropped, along with everything it
/// captured.
pub struct LazyState<S> {
    kind: String,
    computed: OnceLock<Computed<S>>,
    supplier: Mutex<Option<Supplier<S>>>,
}

impl<S: Serialize> LazyState<S> {
    pub fn lazy<F>(kind: impl Into<String>, supplier: F) -> Self
    where
        F: Fn() -> Result<S, StepError> + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            computed: OnceLock::new(),
            supplier: Mutex::new(Some(Box::new(supplier))),
        }
    }

    pub fn new(kind: impl Into<String>, state: S) -> Self
    where
        S: Clone + Send + Sync + 'static,
    {
        Self::lazy(kind, move || Ok(state.clone()))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self) -> Result<&S, StepError> {
        Ok(&self.computed()?.state)
    }

    pub fn key(&self) -> Result<&StateKey, StepError> {
        Ok(&self.computed()?.key)
    }

    pub fn is_computed(&self) -> bool {
        self.computed.get().is_some()
    }

    fn computed(&self) -> Result<&Computed<S>, StepError> {
        if let Some(done) = self.computed.get() {
            return Ok(done);
        }
        let mut supplier = self.supplier.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(done) = self.computed.get() {
            return Ok(done);
        }
        let Some(compute) = supplier.as_ref() else {
            return Err(StepError::State(format!("{}: supplier already consumed", self.kind)));
        };
        let state = compute()?;
        let key = StateKey::encode(&self.kind, &state)?;
        let done = self.computed.get_or_init(|| Computed { state, key });
        *supplier = None;
        Ok(done)
    }
}

impl<S: Serialize + DeserializeOwned> LazyState<S> {
    /// Rebuild an already-computed state from its key.
    pub fn restore(kind: impl Into<String>, key: &StateKey) -> Result<Self, StepError> {
        let kind = kind.into();
        let state: S = key.decode(&kind)?;
        let key = StateKey::encode(&kind, &state)?;
        let computed = OnceLock::new();
        let _ = computed.set(Computed { state, key });
        Ok(Self {
            kind,
            computed,
            supplier: Mutex::new(None),
        })
    }
}

impl<S> fmt::Debug for LazyState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyState")
            .field("kind", &self.kind)
            .field("key", &self.computed.get().map(|done| &done.key))
            .finish()
    }
}
