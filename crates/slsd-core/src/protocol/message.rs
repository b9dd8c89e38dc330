//! Message model: a slash-delimited address plus typed arguments.
//!
//! A message is the unit of communication on the discovery port.  The sender's
//! network endpoint is *not* part of the message — the transport observes it
//! and hands it to the dispatch layer separately, so nothing in the payload
//! can forge where a datagram physically came from.  (The `/sessions` request
//! does embed a *reply* endpoint in its arguments, which is an explicit part
//! of that handler's contract, not of the message model.)

use std::fmt;

/// One typed argument carried by a message.
///
/// The wire protocol supports exactly three payload types.  Anything else in
/// a received type-tag string is rejected at decode time; there is no dynamic
/// or "blob" escape hatch.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    /// 32-bit signed integer, big-endian on the wire (type tag `i`).
    Int(i32),
    /// 32-bit IEEE-754 float, big-endian on the wire (type tag `f`).
    Float(f32),
    /// UTF-8 string, NUL-terminated and NUL-padded on the wire (type tag `s`).
    Str(String),
}

impl OscArg {
    /// Returns the OSC type-tag character for this argument.
    pub fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(v) => write!(f, "{v}"),
            OscArg::Float(v) => write!(f, "{v}"),
            OscArg::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// An immutable, path-addressed message.
///
/// `address` routes the message to a handler (e.g. `/sessions`); `args` is the
/// ordered argument list.  An empty `args` is the valid "no arguments"
/// message, encoded as the bare type-tag string `,`.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Creates a message from an address and arguments.
    ///
    /// The address is validated by the codec on encode/decode, not here, so
    /// construction itself cannot fail.
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Creates the "no arguments" message for `address`.
    pub fn bare(address: impl Into<String>) -> Self {
        Self::new(address, Vec::new())
    }

    /// Renders the arguments as a short human-readable summary for logging,
    /// e.g. `[1, 9000, "127.0.0.1"]`.
    pub fn args_summary(&self) -> String {
        let parts: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Returns `true` if `address` is a well-formed message address: non-empty,
/// starts with `/`, and contains no NUL (which would corrupt the wire string).
pub fn is_valid_address(address: &str) -> bool {
    address.starts_with('/') && !address.contains('\0')
}
