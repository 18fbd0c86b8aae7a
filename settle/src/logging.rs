//! Tracing setup for the `settle` binary.
//!
//! # Output channels
//!
//! - **stdout**: command results, one prefixed line each (`dirty:`, `fixed:`,
//!   `lint:`, `did-not-converge:`, `summary:`). Scripts parse these, so they
//!   never depend on `RUST_LOG`.
//! - **stderr**: tracing events from the library (step failures tolerated by
//!   the policy, padded-cell escalation, index invalidation, close failures),
//!   filtered by `RUST_LOG`, plus the CLI's `warning:`/`hint:` lines and the
//!   final error chain.
//!
//! The library only emits events. Installing a subscriber is left to the
//! binary, so embedding `settle` never prints anything unasked.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: compact events on stderr.
///
/// Defaults to `warn` when `RUST_LOG` is unset or invalid, which keeps
/// tolerated step failures and non-converging files visible. Use
/// `settle=debug` to follow each file through the padded cell.
///
/// # Example
/// ```bash
/// RUST_LOG=settle=debug settle check
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
