//! Constants used throughout the clinical records core crate.
//!
//! Configuration defaults and field limits live here so the binary, the
//! configuration parsers and the validators agree on them.

/// Default SQLite database file when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "clinrec.db";

/// Default maximum number of pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Default number of seconds to wait for a pooled connection.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Maximum characters accepted in free-text clinical notes and commentary.
pub const MAX_FREE_TEXT_LEN: usize = 1000;

/// Highest lab procedure priority value (1 is the most urgent).
pub const LOWEST_LAB_PRIORITY: i32 = 3;
