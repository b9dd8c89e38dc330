//! Session-directory listing and the `/sessions` request handler.
//!
//! A "session" is an opaque `*.slsess` file written by SooperLooper; this
//! module never looks inside one.  The listing is recomputed on every request
//! (never cached) so a reply always reflects the directory as it is right
//! now, and no ordering is promised.
//!
//! # Request contract
//!
//! A `/sessions` request carries exactly three arguments:
//!
//! 1. `requesterId` — string or int, echoed only into the logs.
//! 2. `replyPort`   — int, must fit a `u16`.
//! 3. `replyHost`   — string, IP literal or resolvable hostname.
//!
//! The reply endpoint is self-reported in the payload, not taken from the
//! datagram's sender address, so a requester behind a NAT (or relaying for
//! another machine) can direct the answer wherever it likes.  A request with
//! the wrong shape is logged and silently dropped; this protocol has no
//! error-response message.

use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use slsd_core::{OscArg, OscMessage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transport::UdpTransport;

/// Default filename extension (without the dot) that marks a session file.
/// The config file can override it; see `config::SessionsConfig`.
pub const SESSION_EXTENSION: &str = "slsess";

/// Address handled by [`session_list_handler`] and used for its replies.
pub const SESSIONS_ADDRESS: &str = "/sessions";

/// Error type for session-directory scans.
#[derive(Debug, Error)]
pub enum SessionScanError {
    /// The directory (or an entry's metadata) could not be read.
    #[error("cannot read session directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Scans `dir` for session files and returns their filenames.
///
/// Flat scan, regular files only, filtered to the `.{extension}` suffix.
/// Entries whose metadata cannot be read are skipped rather than failing the
/// whole scan.  The order is whatever the OS returns.
///
/// # Errors
///
/// Returns [`SessionScanError`] if the directory itself cannot be read.
pub fn list_session_files(dir: &Path, extension: &str) -> Result<Vec<String>, SessionScanError> {
    let entries = fs::read_dir(dir).map_err(|source| SessionScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        // `metadata` follows symlinks, matching an "is this a file" check.
        let is_file = entry.metadata().map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            debug!("skipping non-UTF-8 filename in {}", dir.display());
            continue;
        };
        if Path::new(name)
            .extension()
            .is_some_and(|ext| ext == extension)
        {
            files.push(name.to_string());
        }
    }
    Ok(files)
}

/// A validated `/sessions` request.
#[derive(Debug, PartialEq)]
struct SessionRequest {
    requester: String,
    reply_host: String,
    reply_port: u16,
}

impl SessionRequest {
    /// Validates the three-argument request shape.  Any mismatch is a caller
    /// error described by the returned string; the caller logs it and sends
    /// no reply.
    fn parse(msg: &OscMessage) -> Result<Self, String> {
        let [id, port, host] = msg.args.as_slice() else {
            return Err(format!(
                "expected 3 arguments (requesterId, replyPort, replyHost), got {}",
                msg.args.len()
            ));
        };
        let requester = match id {
            OscArg::Int(v) => v.to_string(),
            OscArg::Str(v) => v.clone(),
            OscArg::Float(_) => return Err("requesterId must be an int or string".to_string()),
        };
        let OscArg::Int(port) = port else {
            return Err("replyPort must be an int".to_string());
        };
        let reply_port =
            u16::try_from(*port).map_err(|_| format!("replyPort {port} out of range"))?;
        let OscArg::Str(reply_host) = host else {
            return Err("replyHost must be a string".to_string());
        };
        Ok(Self {
            requester,
            reply_host: reply_host.clone(),
            reply_port,
        })
    }

    /// Resolves the self-reported reply endpoint.  Accepts IP literals and
    /// hostnames; resolution failures are caller errors.
    fn reply_endpoint(&self) -> Result<SocketAddr, String> {
        (self.reply_host.as_str(), self.reply_port)
            .to_socket_addrs()
            .map_err(|e| format!("cannot resolve reply host {:?}: {e}", self.reply_host))?
            .next()
            .ok_or_else(|| format!("reply host {:?} resolved to nothing", self.reply_host))
    }
}

/// Builds the `/sessions` handler.
///
/// The session directory, the filename extension, and the send handle are
/// captured here at registration time; the handler itself reads no ambient
/// state.  Per request it validates the shape, rescans the directory, and
/// sends one `/sessions` reply whose arguments are the filenames.
///
/// An unreadable directory is logged and answered with an *empty* reply, so
/// the requester sees the same surface as an empty directory; the distinction
/// is in the responder's logs.
pub fn session_list_handler(
    session_dir: PathBuf,
    extension: String,
    transport: UdpTransport,
) -> impl Fn(&OscMessage, SocketAddr) -> anyhow::Result<()> {
    move |msg, src| {
        let request = match SessionRequest::parse(msg) {
            Ok(request) => request,
            Err(reason) => {
                warn!(
                    "malformed /sessions request from {src}: {reason} (args {})",
                    msg.args_summary()
                );
                return Ok(());
            }
        };
        let dest = match request.reply_endpoint() {
            Ok(dest) => dest,
            Err(reason) => {
                warn!("undeliverable /sessions request from {src}: {reason}");
                return Ok(());
            }
        };

        let files = match list_session_files(&session_dir, &extension) {
            Ok(files) => files,
            Err(e) => {
                warn!("session scan failed, replying empty: {e}");
                Vec::new()
            }
        };

        info!(
            "/sessions request from {src} (requester {}, reply to {dest}): {} session(s)",
            request.requester,
            files.len()
        );

        let reply = OscMessage::new(
            SESSIONS_ADDRESS,
            files.into_iter().map(OscArg::Str).collect(),
        );
        // Fire-and-forget: an unreachable reply endpoint is the requester's
        // problem, not the dispatch loop's.
        if let Err(e) = transport.send(dest, &reply) {
            warn!("failed to send session list to {dest}: {e}");
        }
        Ok(())
    }
}

/// Builds the wildcard handler: logs the address and arguments of anything
/// without an exact registration and sends no reply.  Tolerates arbitrary
/// argument shapes and never fails.
pub fn fallback_handler() -> impl Fn(&OscMessage, SocketAddr) -> anyhow::Result<()> {
    move |msg, src| {
        info!(
            "received unknown message '{}' from {src} with args {}",
            msg.address,
            msg.args_summary()
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
