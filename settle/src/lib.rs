//! Formatting engine: ordered steps, convergence checking, lints.
//!
//! A [`formatter::Formatter`] runs an ordered list of [`step::Step`]s over a
//! file's text. Whether a file is clean is decided by
//! [`dirty::DirtyState`], which detects formatters that never settle with
//! the padded cell in [`core::padded_cell`]. [`lint_state::LintState`] adds
//! the lints each step reports on the settled text.
//!
//! - **[`core`]**: Pure logic (padded cell, state keys, line endings). No I/O.
//! - **[`io`]**: Configuration, file discovery and the clean-file index.
//!
//! [`check`] and [`bulk`] combine the two to implement CLI commands.

pub mod bulk;
pub mod cache;
pub mod check;
pub mod core;
pub mod dirty;
pub mod error;
pub mod exit_codes;
pub mod formatter;
pub mod io;
pub mod lint_state;
pub mod logging;
pub mod policy;
pub mod step;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
