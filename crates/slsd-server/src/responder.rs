//! The discovery responder: socket ownership, handler registration, and the
//! receive/dispatch loop.
//!
//! The responder binds one UDP socket and runs its receive loop on a
//! dedicated thread so synchronous socket I/O never blocks the caller (or a
//! Tokio runtime the caller may be driving).  Each inbound datagram is
//! decoded and routed by its address string:
//!
//! 1. Exact-match lookup in the handler table.
//! 2. Otherwise the wildcard (fallback) handler, if one is registered.
//! 3. Otherwise the datagram is logged at debug and dropped.
//!
//! At most one handler runs per message, synchronously on the dispatch
//! thread.  Handler failures are caught here, logged, and swallowed — a buggy
//! or malicious datagram must never take the loop down.
//!
//! # Read timeout
//!
//! The socket is configured with a 500 ms read timeout.  On each timeout the
//! loop checks the shared `running` flag, which is how shutdown reaches a
//! thread that is otherwise parked in `recv_from`.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};
use std::thread::JoinHandle;
use std::time::Duration;

use slsd_core::{decode_message, OscMessage};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::transport::UdpTransport;

/// Receive timeout for the dispatch loop; bounds shutdown latency.
const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Receive buffer size.  Requests are tiny; this leaves generous headroom for
/// any well-formed discovery datagram.
const RECV_BUF_SIZE: usize = 4096;

/// Error type for responder startup.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The UDP socket could not be bound (port already in use, privileged
    /// port, etc.).  Fatal to startup.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called a second time on the same responder.
    #[error("responder is already running")]
    AlreadyStarted,
}

/// What a registration matches: one exact address, or anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressPattern {
    /// Matches one address string exactly (e.g. `/sessions`).
    Exact(String),
    /// The wildcard sentinel: matches any address with no exact registration.
    Any,
}

/// A message handler.  Invoked with the decoded message and the transport-
/// observed sender address.  Errors are logged at the dispatch boundary and
/// never propagate further.
pub type Handler = dyn Fn(&OscMessage, SocketAddr) -> anyhow::Result<()> + Send + Sync;

#[derive(Default)]
struct HandlerTable {
    exact: HashMap<String, Arc<Handler>>,
    fallback: Option<Arc<Handler>>,
}

impl HandlerTable {
    /// Resolves the single handler for `address`: exact match wins, then the
    /// wildcard, then none.
    fn resolve(&self, address: &str) -> Option<Arc<Handler>> {
        self.exact
            .get(address)
            .or(self.fallback.as_ref())
            .map(Arc::clone)
    }
}

/// A bound discovery responder.
///
/// Created with [`DiscoveryResponder::bind`], which claims the port up front
/// so startup failures happen before any thread is spawned.  Registrations
/// may be added before or after [`DiscoveryResponder::start`]; the table is
/// behind a `RwLock` that the dispatch loop read-locks per message.
pub struct DiscoveryResponder {
    transport: UdpTransport,
    handlers: Arc<RwLock<HandlerTable>>,
    started: AtomicBool,
}

impl DiscoveryResponder {
    /// Binds the discovery socket on `bind_addr:port`.
    ///
    /// Port 0 asks the OS for an ephemeral port; read the result back with
    /// [`DiscoveryResponder::local_port`] so requesters can be told where to
    /// send.
    ///
    /// # Errors
    ///
    /// Returns [`ResponderError::BindFailed`] if the socket cannot be bound.
    pub fn bind(bind_addr: IpAddr, port: u16) -> Result<Self, ResponderError> {
        let addr = SocketAddr::new(bind_addr, port);
        let socket =
            UdpSocket::bind(addr).map_err(|source| ResponderError::BindFailed { addr, source })?;
        let transport = UdpTransport::new(Arc::new(socket));
        transport.set_read_timeout(RECV_TIMEOUT).ok();

        Ok(Self {
            transport,
            handlers: Arc::new(RwLock::new(HandlerTable::default())),
            started: AtomicBool::new(false),
        })
    }

    /// Returns the port the socket is actually bound to.
    pub fn local_port(&self) -> u16 {
        self.transport.local_port()
    }

    /// Returns a clone of the shared send handle.  Handlers and the main
    /// context use this to send replies and probes through the same socket.
    pub fn transport(&self) -> UdpTransport {
        self.transport.clone()
    }

    /// Registers `handler` for `pattern`.  A second registration for the same
    /// pattern replaces the first.
    pub fn register<F>(&self, pattern: AddressPattern, handler: F)
    where
        F: Fn(&OscMessage, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Arc<Handler> = Arc::new(handler);
        let mut table = self.handlers.write().expect("handler table poisoned");
        match pattern {
            AddressPattern::Exact(address) => {
                table.exact.insert(address, handler);
            }
            AddressPattern::Any => table.fallback = Some(handler),
        }
    }

    /// Convenience wrapper: registers the wildcard (fallback) handler.
    pub fn register_fallback<F>(&self, handler: F)
    where
        F: Fn(&OscMessage, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(AddressPattern::Any, handler);
    }

    /// Spawns the receive/dispatch loop on a dedicated thread.
    ///
    /// The loop runs until `running` clears.  Never blocks the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ResponderError::AlreadyStarted`] on a second call.
    pub fn start(&self, running: Arc<AtomicBool>) -> Result<JoinHandle<()>, ResponderError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ResponderError::AlreadyStarted);
        }

        let transport = self.transport.clone();
        let handlers = Arc::clone(&self.handlers);
        let port = self.local_port();

        let handle = std::thread::Builder::new()
            .name("slsd-dispatch".to_string())
            .spawn(move || dispatch_loop(transport, handlers, running))
            .expect("failed to spawn dispatch thread");

        info!("discovery responder listening on UDP port {port}");
        Ok(handle)
    }
}

/// The main receive loop executed on the dispatch thread.
fn dispatch_loop(
    transport: UdpTransport,
    handlers: Arc<RwLock<HandlerTable>>,
    running: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; RECV_BUF_SIZE];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match transport.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                error!("discovery recv error: {e}");
                continue;
            }
        };

        let msg = match decode_message(&buf[..len]) {
            Ok((msg, _)) => msg,
            Err(e) => {
                debug!("failed to decode datagram from {src}: {e}");
                continue;
            }
        };

        // Resolve under the read lock, invoke outside it, so a handler that
        // registers further handlers cannot deadlock the table.
        let handler = {
            let table = handlers.read().expect("handler table poisoned");
            table.resolve(&msg.address)
        };

        match handler {
            Some(handler) => {
                if let Err(e) = handler(&msg, src) {
                    warn!("handler for '{}' failed: {e:#}", msg.address);
                }
            }
            None => {
                debug!(
                    "no handler for '{}' from {src}, dropping {}",
                    msg.address,
                    msg.args_summary()
                );
            }
        }
    }

    info!("discovery responder stopped");
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
