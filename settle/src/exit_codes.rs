//! Stable exit codes for `settle` commands.

/// Every file is clean, or was rewritten to its canonical form.
pub const OK: i32 = 0;
/// Bad configuration, unreadable files, or a step failure the policy refused.
pub const INVALID: i32 = 1;
/// `settle check` found files that need formatting or carry lints.
pub const DIRTY: i32 = 2;
/// Some file's formatter output never settled.
pub const DID_NOT_CONVERGE: i32 = 3;
