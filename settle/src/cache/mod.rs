//! Identity and sharing support for incremental runs.

pub mod signature;
pub mod state_cache;

pub use signature::{FileSignature, content_hash};
pub use state_cache::{FuncCache, StateCache};
