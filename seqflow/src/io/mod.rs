//! I/O helpers for seqflow commands.

pub mod config;
pub mod handler;
pub mod lock;
pub mod scan;
pub mod status;
