//! Foundational low-level utilities shared across lintrelay crates.
//!
//! Provides the atomic file-write helper used by the filesystem artifact store
//! and the time helpers behind scheduler freshness checks.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp_ms, is_within_trailing_window, parse_rfc3339_utc};
