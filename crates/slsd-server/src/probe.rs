//! Periodic self-test prober.
//!
//! Once a second (configurable) the prober sends a real `/sessions` request
//! to the responder, naming its own ephemeral socket as the reply endpoint,
//! and waits briefly for the answer.  A healthy responder shows up as a
//! debug-level heartbeat with the current session count; a missing reply is
//! a warning.
//!
//! The prober is a cancellable Tokio task: a `watch` channel carries the
//! shutdown signal and `select!` races it against the interval timer, so
//! shutdown does not wait out a sleep.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use slsd_core::{decode_message, encode_message, OscArg, OscMessage};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{interval, timeout};
use tracing::{debug, warn};

use crate::sessions::SESSIONS_ADDRESS;

/// How long each tick waits for the responder's reply.
const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Runs the probe loop until `shutdown` fires.
///
/// `target` is the responder's discovery endpoint.  The probe binds its own
/// ephemeral loopback socket for replies, so probe traffic never collides
/// with real requesters.
///
/// # Errors
///
/// Returns an error only for setup failures (socket bind, request encode);
/// per-tick send/receive failures are logged and the loop keeps going.
pub async fn run_probe(
    target: SocketAddr,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let reply_port = socket.local_addr()?.port();

    let request = OscMessage::new(
        SESSIONS_ADDRESS,
        vec![
            OscArg::Int(std::process::id() as i32),
            OscArg::Int(i32::from(reply_port)),
            OscArg::Str(Ipv4Addr::LOCALHOST.to_string()),
        ],
    );
    let request_bytes = encode_message(&request)?;

    let mut ticker = interval(period);
    let mut buf = vec![0u8; 65_536];

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = socket.send_to(&request_bytes, target).await {
                    warn!("self-test send to {target} failed: {e}");
                    continue;
                }
                match timeout(REPLY_TIMEOUT, socket.recv_from(&mut buf)).await {
                    Ok(Ok((len, _))) => match decode_message(&buf[..len]) {
                        Ok((reply, _)) => {
                            debug!(
                                "self-test ok: {} session(s) via '{}'",
                                reply.args.len(),
                                reply.address
                            );
                        }
                        Err(e) => warn!("self-test reply did not decode: {e}"),
                    },
                    Ok(Err(e)) => warn!("self-test recv failed: {e}"),
                    Err(_) => warn!("no self-test reply from {target} within {REPLY_TIMEOUT:?}"),
                }
            }
            _ = shutdown.changed() => {
                debug!("self-test prober stopping");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The probe must exit promptly when the shutdown channel fires, even
    /// though nothing is answering its requests.
    #[tokio::test]
    async fn test_probe_is_cancellable() {
        let blackhole = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let target = blackhole.local_addr().unwrap();

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(run_probe(target, Duration::from_millis(50), rx));

        tokio::time::sleep(Duration::from_millis(120)).await;
        tx.send(true).unwrap();

        let joined = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("probe must stop after shutdown signal")
            .expect("probe task must not panic");
        assert!(joined.is_ok());
    }
}
