//! Exit codes for the egg CLI.
//!
//! Coarse and stable: 0 success, 1 pipeline failure, 2 argument error (the
//! clap default). Fine-grained failure semantics travel in the `E_*` reason
//! code that prefixes every error line on stderr.

/// Pipeline completed.
pub const EXIT_SUCCESS: i32 = 0;

/// Pipeline failed; stderr carries a single `E_*` line.
pub const EXIT_FAILURE: i32 = 1;
