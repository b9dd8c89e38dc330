//! Protocol module containing the message model and the binary codec.

pub mod codec;
pub mod message;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use message::{OscArg, OscMessage};
