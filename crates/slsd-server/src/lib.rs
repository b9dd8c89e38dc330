//! slsd-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

pub mod config;
pub mod probe;
pub mod responder;
pub mod sessions;
pub mod transport;
