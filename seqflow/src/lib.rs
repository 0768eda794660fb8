//! Lifecycle manager for sequencing run directories.
//!
//! A run directory moves from "in progress" through "complete" to
//! "access revoked", coordinated across independent cron-style invocations
//! that must not race each other. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (path derivation).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (marker queries, cooperative
//!   locks, run discovery, config, the external step handler).
//!
//! Orchestration modules ([`forbid`], [`dispatch`]) coordinate core logic
//! with I/O to implement CLI commands. Expected no-op conditions (lock held
//! elsewhere, run not complete, already forbidden, error marker set) are
//! values, not errors; only real I/O failures propagate as `Err`.

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod forbid;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
