//! Stable exit codes for seqflow CLI commands.

/// Command succeeded, or halted on a designed no-op condition (lock held
/// elsewhere, run not complete, already forbidden, error marker set).
pub const OK: i32 = 0;
/// Illegal step name: not in the configured allow-list.
pub const USAGE: i32 = 1;
/// Unrecoverable I/O failure during lock, forbid, or dispatch handling.
pub const FAILURE: i32 = 2;
