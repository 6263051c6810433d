// Scripted mock debuggee
//
// A stand-in for a JVM with a JDWP agent: it dials the debugger, answers
// the protocol, and walks a fixed scenario of worker thread starts and
// deaths, pausing at sync rendezvous points so the test side controls
// the pacing.
//
// The scenario, one rendezvous per phase:
//   1. attach and handshake, then wait for the go signal
//   2. start the worker threads (THREAD_START events fire)
//   3. let the workers die (THREAD_DEATH events fire)
// then report VM_DEATH and exit 0, unless a VirtualMachine.Exit arrived
// first.

mod server;
mod vmstate;

use crate::error::HarnessResult;
use crate::sync::SyncChannel;
use server::ScenarioOp;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use vmstate::VmState;

/// How long the debuggee waits at each rendezvous before giving up.
const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// The debugger's JDWP listener, host:port.
    pub jdwp_addr: String,
    /// The debugger's sync listener, host:port.
    pub sync_addr: String,
    /// Worker threads the scenario starts and kills.
    pub workers: u32,
}

/// Run the whole debuggee lifetime. The returned code is what the
/// process should exit with.
pub async fn run(config: MockConfig) -> HarnessResult<i32> {
    info!(
        "Mock debuggee starting: jdwp={} sync={} workers={}",
        config.jdwp_addr, config.sync_addr, config.workers
    );

    let stream = TcpStream::connect(&config.jdwp_addr).await?;
    let state = VmState::new(config.workers);
    let (op_tx, op_rx) = mpsc::channel(8);

    let serve = server::run_mock_vm(stream, state, op_rx);
    tokio::pin!(serve);

    let script = run_script(&config, op_tx);
    tokio::pin!(script);

    // The debugger can end the session at any point (Exit, Dispose, or a
    // plain disconnect), so the script never outlives the serve loop.
    tokio::select! {
        result = &mut serve => return Ok(result?.unwrap_or(0)),
        result = &mut script => result?,
    }

    // Script done and the op channel closed: the serve loop reports
    // VM_DEATH and winds down on its own.
    Ok(serve.await?.unwrap_or(0))
}

async fn run_script(config: &MockConfig, op_tx: mpsc::Sender<ScenarioOp>) -> HarnessResult<()> {
    let mut sync = SyncChannel::connect(&config.sync_addr, SYNC_TIMEOUT).await?;

    // The debugger sets up its event requests before letting us move.
    sync.rendezvous().await?;
    drive(&op_tx, |done| ScenarioOp::StartWorkers { done }).await?;

    // The debugger has seen the starts.
    sync.rendezvous().await?;
    drive(&op_tx, |done| ScenarioOp::KillWorkers { done }).await?;

    // The debugger has seen the deaths.
    sync.rendezvous().await?;
    Ok(())
}

async fn drive<F>(op_tx: &mpsc::Sender<ScenarioOp>, op: F) -> HarnessResult<()>
where
    F: FnOnce(oneshot::Sender<()>) -> ScenarioOp,
{
    let (done_tx, done_rx) = oneshot::channel();
    if op_tx.send(op(done_tx)).await.is_err() {
        // Serve loop already gone; the select in run settles the outcome.
        return Ok(());
    }
    let _ = done_rx.await;
    Ok(())
}
