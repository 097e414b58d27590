//! Unified exit codes for the attest CLI.
//! These codes are part of the public contract; CI scripts depend on them.

pub const SUCCESS: i32 = 0;
pub const CRITERION_FAILED: i32 = 1; // Evaluation completed; content did not meet the criterion
pub const CONFIG_ERROR: i32 = 2; // Bad flags, missing credentials, or transport failure
