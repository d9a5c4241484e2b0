//! Stable exit codes for pilot CLI commands.

/// Command succeeded; every requested run completed.
pub const OK: i32 = 0;
/// Command failed due to invalid config/layout/arguments or other errors.
pub const INVALID: i32 = 1;
/// One or more runs were abandoned (bad label, generation exhausted, policy
/// unavailable); remaining runs still completed.
pub const ABANDONED: i32 = 2;
