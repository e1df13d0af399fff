//! Structured logging for embedx
//!
//! - `init(profile)` installs the global subscriber once
//! - `log_op_start!`, `log_op_end!` and `log_op_error!` emit boundary events
//! - `test_capture` records events in memory for assertions
//!
//! The four reconciliation entry points (`cast`, `change`, `apply_changes`,
//! `apply_each_callback`) own boundary logging. Everything below them logs at
//! debug level only.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
