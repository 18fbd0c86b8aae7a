//! Deterministic, pure logic shared by the formatting pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and bytes and return deterministic outputs suitable for tests.

pub mod encoding;
pub mod line_ending;
pub mod lint;
pub mod padded_cell;
pub mod state;
pub mod value_per_step;
