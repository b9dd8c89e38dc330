//! UDP datagram transport for discovery messages.
//!
//! [`UdpTransport`] is a cheap-clone handle around one bound socket.  The
//! dispatch loop, its handlers, and the main context all hold clones and call
//! [`UdpTransport::send`] concurrently; each send is a single `send_to`
//! syscall on the shared socket, so no additional serialisation is needed.
//!
//! Delivery is best-effort: no acknowledgement, no retry, no confirmation.
//! A failed send is reported to the caller, who treats it as fire-and-forget
//! and logs.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use slsd_core::{encode_message, OscMessage, ProtocolError};
use thiserror::Error;

/// Error type for send-side transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The message could not be encoded to the wire format.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] ProtocolError),

    /// The datagram could not be handed to the OS (unreachable host, etc.).
    #[error("failed to send datagram to {dest}: {source}")]
    Send {
        dest: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Shared handle to the responder's UDP socket.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Wraps an already-bound socket.  The responder owns binding so that a
    /// bind failure surfaces as its startup error, not a transport error.
    pub(crate) fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }

    /// Returns the local port the underlying socket is bound to.
    pub fn local_port(&self) -> u16 {
        self.socket
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    /// Encodes `msg` and sends it to `dest` as a single datagram.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when encoding fails or the OS rejects the
    /// send.  Both are non-fatal; callers log and move on.
    pub fn send(&self, dest: SocketAddr, msg: &OscMessage) -> Result<(), TransportError> {
        let bytes = encode_message(msg)?;
        self.socket
            .send_to(&bytes, dest)
            .map_err(|source| TransportError::Send { dest, source })?;
        Ok(())
    }

    /// Blocks for the next datagram, up to the socket's read timeout.
    ///
    /// Used only by the dispatch loop; timeouts surface as `WouldBlock` /
    /// `TimedOut` I/O errors so the loop can poll its shutdown flag.
    pub(crate) fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }

    /// Sets the receive timeout the dispatch loop relies on.
    pub(crate) fn set_read_timeout(&self, timeout: Duration) -> std::io::Result<()> {
        self.socket.set_read_timeout(Some(timeout))
    }
}
