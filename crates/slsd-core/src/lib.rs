//! # slsd-core
//!
//! Shared wire-protocol library for slsd, the SooperLooper session discovery
//! responder.  It defines the message model (a path-like address plus a short
//! list of typed arguments) and the binary codec that turns messages into
//! datagrams and back.
//!
//! The format is the OSC 1.0 subset spoken by liblo-based peers: NUL-padded
//! strings, a `,`-prefixed type-tag string, and big-endian scalar payloads.
//! See [`protocol::codec`] for the exact layout.
//!
//! This crate has zero dependencies on sockets or the OS; the server crate
//! owns all I/O.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `slsd_core::OscMessage` instead of `slsd_core::protocol::message::OscMessage`.
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::message::{OscArg, OscMessage};
