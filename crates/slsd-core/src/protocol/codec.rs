//! Binary codec for encoding and decoding discovery messages.
//!
//! Wire format (OSC 1.0 subset, one message per datagram):
//! ```text
//! [address: padded string][",<tags>": padded string][arg payloads...]
//! ```
//! Strings are NUL-terminated and NUL-padded to a 4-byte boundary (always at
//! least one NUL).  The type-tag string carries one character per argument:
//! `i` (int32), `f` (float32), `s` (string).  Scalars are big-endian.  A
//! message with no arguments carries the bare type-tag string `,`.
//!
//! Decode tolerance: legacy senders omit the type-tag string entirely for
//! no-argument messages, so a datagram that ends right after the address
//! decodes as an empty argument list.

use thiserror::Error;

use crate::protocol::message::{is_valid_address, OscArg, OscMessage};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the data it claims to contain.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message address is not a well-formed `/`-prefixed path.
    #[error("invalid message address: {0:?}")]
    InvalidAddress(String),

    /// The type-tag string names an argument type this protocol does not carry.
    #[error("unsupported type tag: {0:?}")]
    UnsupportedTypeTag(char),

    /// The payload could not be parsed (unterminated string, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`OscMessage`] into a datagram-ready byte vector.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidAddress`] if the address does not start
/// with `/` or contains a NUL, and [`ProtocolError::MalformedPayload`] if a
/// string argument contains a NUL.
///
/// # Examples
///
/// ```rust
/// use slsd_core::{encode_message, decode_message, OscArg, OscMessage};
///
/// let msg = OscMessage::new("/sessions", vec![OscArg::Int(1)]);
/// let bytes = encode_message(&msg).unwrap();
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &OscMessage) -> Result<Vec<u8>, ProtocolError> {
    if !is_valid_address(&msg.address) {
        return Err(ProtocolError::InvalidAddress(msg.address.clone()));
    }

    let mut buf = Vec::with_capacity(64);
    write_padded_string(&mut buf, &msg.address)?;

    let mut tags = String::with_capacity(1 + msg.args.len());
    tags.push(',');
    for arg in &msg.args {
        tags.push(arg.type_tag());
    }
    write_padded_string(&mut buf, &tags)?;

    for arg in &msg.args {
        match arg {
            OscArg::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
            OscArg::Str(s) => write_padded_string(&mut buf, s)?,
        }
    }
    Ok(buf)
}

/// Decodes one [`OscMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed so the
/// caller can detect trailing garbage in a datagram.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_message(bytes: &[u8]) -> Result<(OscMessage, usize), ProtocolError> {
    let (address, mut off) = read_padded_string(bytes, 0)?;
    if !is_valid_address(&address) {
        return Err(ProtocolError::InvalidAddress(address));
    }

    // Legacy no-argument form: nothing after the address.
    if off == bytes.len() {
        return Ok((OscMessage::bare(address), off));
    }

    let (tags, tags_end) = read_padded_string(bytes, off)?;
    off = tags_end;

    let Some(tags) = tags.strip_prefix(',') else {
        return Err(ProtocolError::MalformedPayload(format!(
            "type-tag string must start with ',': {tags:?}"
        )));
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        match tag {
            'i' => {
                let v = read_i32(bytes, off)?;
                off += 4;
                args.push(OscArg::Int(v));
            }
            'f' => {
                let v = read_i32(bytes, off)?;
                off += 4;
                args.push(OscArg::Float(f32::from_bits(v as u32)));
            }
            's' => {
                let (s, next) = read_padded_string(bytes, off)?;
                off = next;
                args.push(OscArg::Str(s));
            }
            other => return Err(ProtocolError::UnsupportedTypeTag(other)),
        }
    }

    Ok((OscMessage::new(address, args), off))
}

// ── Wire primitives ───────────────────────────────────────────────────────────

/// Rounds `len` up to the size a NUL-terminated string of that many bytes
/// occupies on the wire (next multiple of 4, with at least one NUL).
fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

/// Writes `s` followed by 1..=4 NUL bytes so the total is a multiple of 4.
fn write_padded_string(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    if s.contains('\0') {
        return Err(ProtocolError::MalformedPayload(
            "string argument contains NUL".to_string(),
        ));
    }
    let bytes = s.as_bytes();
    buf.extend_from_slice(bytes);
    for _ in bytes.len()..padded_len(bytes.len()) {
        buf.push(0);
    }
    Ok(())
}

/// Reads a NUL-terminated, NUL-padded string starting at `offset`.
///
/// Returns the string and the offset of the byte after the padding.
fn read_padded_string(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    if offset >= buf.len() {
        return Err(ProtocolError::InsufficientData {
            needed: offset + 4,
            available: buf.len(),
        });
    }
    let Some(rel_nul) = buf[offset..].iter().position(|&b| b == 0) else {
        return Err(ProtocolError::MalformedPayload(format!(
            "unterminated string at offset {offset}"
        )));
    };
    let end = offset + padded_len(rel_nul);
    if end > buf.len() {
        return Err(ProtocolError::InsufficientData {
            needed: end,
            available: buf.len(),
        });
    }
    let s = std::str::from_utf8(&buf[offset..offset + rel_nul])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, end))
}

fn read_i32(buf: &[u8], offset: usize) -> Result<i32, ProtocolError> {
    if buf.len() < offset + 4 {
        return Err(ProtocolError::InsufficientData {
            needed: offset + 4,
            available: buf.len(),
        });
    }
    Ok(i32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
