//! Stable exit codes for the `consume` CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments or config, or an infrastructure failure (missing binary,
/// non-zero tool exit, malformed output, server failure).
pub const INVALID: i32 = 1;
/// The client ran the fixture and at least one selected case failed.
pub const CONSUME_FAILED: i32 = 2;
