// Shared setup for the mock-debuggee integration tests. Not every test
// binary touches every half of the session, hence the dead_code allow.
#![allow(dead_code)]

use jdwp_mirror::{EventChannel, Timeouts, VmMirror};
use jpda_harness::{Debuggee, SyncChannel, SyncServer};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Upper bound for every wait in these tests: replies, events, sync
/// phases, and process exits.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// One booted debugging session against a mock debuggee process.
pub struct Session {
    pub mirror: VmMirror,
    pub events: EventChannel,
    pub sync: SyncChannel,
    pub debuggee: Debuggee,
}

/// RUST_LOG-gated tracing to stderr; first caller in the test binary wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Integration test setup:
/// - bind a JDWP listener and a sync listener on loopback ports
/// - launch the mock-debuggee binary pointed at both
/// - accept its JDWP connection and run the protocol handshake
/// - accept its sync connection
///
/// The debuggee then sits at its first rendezvous until the test calls
/// `session.sync.release()`.
pub async fn boot(workers: u32) -> Session {
    init_tracing();

    let jdwp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sync_server = SyncServer::bind("127.0.0.1:0").await.unwrap();
    let jdwp_addr = jdwp_listener.local_addr().unwrap().to_string();
    let sync_addr = sync_server.local_addr().unwrap().to_string();

    let debuggee = Debuggee::launch(
        env!("CARGO_BIN_EXE_mock-debuggee"),
        &[
            "--jdwp",
            &jdwp_addr,
            "--sync",
            &sync_addr,
            "--workers",
            &workers.to_string(),
        ],
    )
    .unwrap();

    let timeouts = Timeouts {
        reply: STEP_TIMEOUT,
        event: STEP_TIMEOUT,
    };
    let (mirror, events) = VmMirror::accept(&jdwp_listener, timeouts).await.unwrap();
    let sync = sync_server.accept(STEP_TIMEOUT).await.unwrap();

    Session {
        mirror,
        events,
        sync,
        debuggee,
    }
}
