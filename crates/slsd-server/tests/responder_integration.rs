//! End-to-end tests for the discovery responder.
//!
//! Each test stands up a real responder on an ephemeral loopback port with a
//! temporary session directory, then talks to it over UDP exactly as an
//! external requester would: encode a request, send it, and wait for the
//! reply on the requester's own socket.

use std::net::UdpSocket;
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use slsd_core::{decode_message, encode_message, OscArg, OscMessage};
use slsd_server::responder::{AddressPattern, DiscoveryResponder};
use slsd_server::sessions::{
    fallback_handler, session_list_handler, SESSIONS_ADDRESS, SESSION_EXTENSION,
};
use tempfile::TempDir;

/// A running responder plus the machinery to shut it down on drop.
struct TestResponder {
    port: u16,
    running: Arc<AtomicBool>,
    dispatch: Option<JoinHandle<()>>,
}

impl TestResponder {
    /// Binds a responder on loopback serving `session_dir` with the standard
    /// handler pair, and starts its dispatch loop.
    fn start(session_dir: &Path) -> Self {
        let responder =
            DiscoveryResponder::bind("127.0.0.1".parse().unwrap(), 0).expect("bind responder");
        responder.register(
            AddressPattern::Exact(SESSIONS_ADDRESS.to_string()),
            session_list_handler(
                session_dir.to_path_buf(),
                SESSION_EXTENSION.to_string(),
                responder.transport(),
            ),
        );
        responder.register_fallback(fallback_handler());

        let running = Arc::new(AtomicBool::new(true));
        let dispatch = responder.start(Arc::clone(&running)).expect("start");

        Self {
            port: responder.local_port(),
            running,
            dispatch: Some(dispatch),
        }
    }
}

impl Drop for TestResponder {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.dispatch.take() {
            handle.join().expect("dispatch thread panicked");
        }
    }
}

/// A requester endpoint: a socket that self-reports its own address in the
/// request payload and reads the reply back.
struct Requester {
    socket: UdpSocket,
}

impl Requester {
    fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind requester");
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        Self { socket }
    }

    fn reply_port(&self) -> i32 {
        i32::from(self.socket.local_addr().unwrap().port())
    }

    /// Sends a `/sessions` request naming this socket as the reply endpoint.
    fn request_sessions(&self, responder_port: u16, requester_id: OscArg) {
        let msg = OscMessage::new(
            SESSIONS_ADDRESS,
            vec![
                requester_id,
                OscArg::Int(self.reply_port()),
                OscArg::Str("127.0.0.1".into()),
            ],
        );
        self.send_raw(responder_port, &encode_message(&msg).unwrap());
    }

    fn send_raw(&self, responder_port: u16, bytes: &[u8]) {
        self.socket
            .send_to(bytes, ("127.0.0.1", responder_port))
            .expect("send request");
    }

    /// Waits for one reply and returns it decoded.
    fn recv_reply(&self) -> OscMessage {
        let mut buf = [0u8; 65_536];
        let (len, _) = self.socket.recv_from(&mut buf).expect("reply expected");
        decode_message(&buf[..len]).expect("reply must decode").0
    }

    /// Asserts that no reply arrives within the read timeout.
    fn assert_no_reply(&self) {
        let mut buf = [0u8; 1024];
        assert!(
            self.socket.recv_from(&mut buf).is_err(),
            "no reply expected"
        );
    }
}

fn touch(dir: &Path, name: &str) {
    std::fs::File::create(dir.join(name)).expect("create fixture file");
}

fn filenames(msg: &OscMessage) -> Vec<String> {
    let mut names: Vec<String> = msg
        .args
        .iter()
        .map(|arg| match arg {
            OscArg::Str(s) => s.clone(),
            other => panic!("reply arguments must all be strings, got {other}"),
        })
        .collect();
    names.sort();
    names
}

// ── End-to-end behaviour ──────────────────────────────────────────────────────

#[test]
fn test_request_receives_session_files_only() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "a.slsess");
    touch(dir.path(), "b.slsess");
    touch(dir.path(), "notes.txt");
    std::fs::create_dir(dir.path().join("folder.slsess")).unwrap();

    let responder = TestResponder::start(dir.path());
    let requester = Requester::new();

    requester.request_sessions(responder.port, OscArg::Int(1));
    let reply = requester.recv_reply();

    assert_eq!(reply.address, SESSIONS_ADDRESS);
    assert_eq!(filenames(&reply), vec!["a.slsess", "b.slsess"]);
}

#[test]
fn test_empty_directory_yields_empty_reply() {
    let dir = TempDir::new().unwrap();
    let responder = TestResponder::start(dir.path());
    let requester = Requester::new();

    requester.request_sessions(responder.port, OscArg::Str("empty-check".into()));
    let reply = requester.recv_reply();

    assert_eq!(reply.address, SESSIONS_ADDRESS);
    assert!(reply.args.is_empty());
}

#[test]
fn test_listing_is_recomputed_per_request() {
    let dir = TempDir::new().unwrap();
    let responder = TestResponder::start(dir.path());
    let requester = Requester::new();

    requester.request_sessions(responder.port, OscArg::Int(1));
    assert!(requester.recv_reply().args.is_empty());

    // A file created after startup must appear in the next reply.
    touch(dir.path(), "late.slsess");
    requester.request_sessions(responder.port, OscArg::Int(2));
    assert_eq!(filenames(&requester.recv_reply()), vec!["late.slsess"]);
}

#[test]
fn test_unreadable_directory_still_gets_empty_reply() {
    // The responder serves a directory that disappears after startup: the
    // scan fails, the failure is the operator's problem (logged), and the
    // requester still receives an empty listing rather than silence.
    let dir = TempDir::new().unwrap();
    let doomed = dir.path().join("sessions");
    std::fs::create_dir(&doomed).unwrap();
    touch(&doomed, "soon-gone.slsess");

    let responder = TestResponder::start(&doomed);
    std::fs::remove_dir_all(&doomed).unwrap();

    let requester = Requester::new();
    requester.request_sessions(responder.port, OscArg::Int(1));
    let reply = requester.recv_reply();

    assert_eq!(reply.address, SESSIONS_ADDRESS);
    assert!(reply.args.is_empty(), "scan failure must reply empty");

    // The responder keeps serving once the directory comes back.
    std::fs::create_dir(&doomed).unwrap();
    touch(&doomed, "restored.slsess");
    requester.request_sessions(responder.port, OscArg::Int(2));
    assert_eq!(filenames(&requester.recv_reply()), vec!["restored.slsess"]);
}

#[test]
fn test_malformed_request_gets_no_reply_and_responder_survives() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "still-here.slsess");

    let responder = TestResponder::start(dir.path());
    let requester = Requester::new();

    // Missing the replyHost argument.
    let short = OscMessage::new(
        SESSIONS_ADDRESS,
        vec![OscArg::Int(1), OscArg::Int(requester.reply_port())],
    );
    requester.send_raw(responder.port, &encode_message(&short).unwrap());
    requester.assert_no_reply();

    // Wrongly-typed replyPort.
    let wrong_type = OscMessage::new(
        SESSIONS_ADDRESS,
        vec![
            OscArg::Int(1),
            OscArg::Str("9000".into()),
            OscArg::Str("127.0.0.1".into()),
        ],
    );
    requester.send_raw(responder.port, &encode_message(&wrong_type).unwrap());
    requester.assert_no_reply();

    // A well-formed request afterwards still works.
    requester.request_sessions(responder.port, OscArg::Int(3));
    assert_eq!(filenames(&requester.recv_reply()), vec!["still-here.slsess"]);
}

#[test]
fn test_unknown_address_hits_fallback_with_no_reply() {
    let dir = TempDir::new().unwrap();
    let responder = TestResponder::start(dir.path());
    let requester = Requester::new();

    let msg = OscMessage::new("/definitely-unknown", vec![OscArg::Float(0.5)]);
    requester.send_raw(responder.port, &encode_message(&msg).unwrap());
    requester.assert_no_reply();
}

#[test]
fn test_concurrent_requesters_each_get_their_own_reply() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "shared.slsess");

    let responder = TestResponder::start(dir.path());
    let requesters: Vec<Requester> = (0..4).map(|_| Requester::new()).collect();

    // Fire all requests before reading any reply, so they queue up within
    // one dispatch window.
    for (i, requester) in requesters.iter().enumerate() {
        requester.request_sessions(responder.port, OscArg::Int(i as i32));
    }
    for requester in &requesters {
        let reply = requester.recv_reply();
        assert_eq!(reply.address, SESSIONS_ADDRESS);
        assert_eq!(filenames(&reply), vec!["shared.slsess"]);
    }
}

#[test]
fn test_reply_goes_to_payload_endpoint_not_sender() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "routed.slsess");

    let responder = TestResponder::start(dir.path());
    let sender = Requester::new();
    let receiver = Requester::new();

    // The sender names the *receiver's* socket as the reply endpoint.
    let msg = OscMessage::new(
        SESSIONS_ADDRESS,
        vec![
            OscArg::Str("relay".into()),
            OscArg::Int(receiver.reply_port()),
            OscArg::Str("127.0.0.1".into()),
        ],
    );
    sender.send_raw(responder.port, &encode_message(&msg).unwrap());

    assert_eq!(filenames(&receiver.recv_reply()), vec!["routed.slsess"]);
    sender.assert_no_reply();
}
