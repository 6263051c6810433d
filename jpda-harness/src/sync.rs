// Debuggee synchronization channel
//
// A plain TCP line channel beside the JDWP connection. Both sides rendezvous
// by exchanging single-line tokens: the debuggee reports "ready" at each
// scripted point and blocks until the test answers "continue". Nothing here
// polls; every wait either completes, mismatches, or times out.

use crate::error::{HarnessError, HarnessResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// Token a debuggee sends when it reaches a scripted point.
pub const SGNL_READY: &str = "ready";
/// Token the test side sends to let the debuggee proceed.
pub const SGNL_CONTINUE: &str = "continue";

/// Test-side listener for the synchronization channel.
pub struct SyncServer {
    listener: TcpListener,
}

impl SyncServer {
    pub async fn bind(addr: &str) -> HarnessResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> HarnessResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the debuggee to connect its half of the channel.
    pub async fn accept(&self, timeout: Duration) -> HarnessResult<SyncChannel> {
        let (stream, peer) = tokio::time::timeout(timeout, self.listener.accept())
            .await
            .map_err(|_| HarnessError::SyncTimeout(timeout))??;
        info!("Synchronizer connected from {}", peer);
        Ok(SyncChannel::over(stream, timeout))
    }
}

/// One endpoint of the synchronization channel. Messages are UTF-8 tokens,
/// one per line, delivered strictly in FIFO order.
pub struct SyncChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl SyncChannel {
    /// Debuggee side: connect to the test's listener.
    pub async fn connect(addr: &str, timeout: Duration) -> HarnessResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        info!("Synchronizer connected to {}", addr);
        Ok(Self::over(stream, timeout))
    }

    fn over(stream: TcpStream, timeout: Duration) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout,
        }
    }

    pub async fn send_message(&mut self, message: &str) -> HarnessResult<()> {
        debug!("sync send: {}", message);
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next message in FIFO order, or a timeout error.
    pub async fn receive_message(&mut self) -> HarnessResult<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(self.timeout, self.reader.read_line(&mut line))
            .await
            .map_err(|_| HarnessError::SyncTimeout(self.timeout))??;
        if read == 0 {
            return Err(HarnessError::SyncClosed);
        }
        let message = line.trim_end_matches(['\n', '\r']).to_string();
        debug!("sync recv: {}", message);
        Ok(message)
    }

    /// Receive and insist on an exact token. A different token is a hard
    /// mismatch; the unexpected message is reported, not discarded silently.
    pub async fn expect_message(&mut self, expected: &str) -> HarnessResult<()> {
        let received = self.receive_message().await?;
        if received != expected {
            return Err(HarnessError::SyncMismatch {
                expected: expected.to_string(),
                received,
            });
        }
        Ok(())
    }

    /// Debuggee-side shorthand for one rendezvous: report ready, block
    /// until told to continue.
    pub async fn rendezvous(&mut self) -> HarnessResult<()> {
        self.send_message(SGNL_READY).await?;
        self.expect_message(SGNL_CONTINUE).await
    }

    /// Test-side shorthand: wait for ready, answer continue.
    pub async fn release(&mut self) -> HarnessResult<()> {
        self.expect_message(SGNL_READY).await?;
        self.send_message(SGNL_CONTINUE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pair() -> (SyncChannel, SyncChannel) {
        let server = SyncServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let timeout = Duration::from_secs(2);

        let client = tokio::spawn(async move { SyncChannel::connect(&addr, timeout).await });
        let accepted = server.accept(timeout).await.unwrap();
        (accepted, client.await.unwrap().unwrap())
    }

    #[tokio::test]
    async fn test_messages_arrive_in_fifo_order() {
        let (mut a, mut b) = pair().await;
        b.send_message("first").await.unwrap();
        b.send_message("second").await.unwrap();
        b.send_message("third").await.unwrap();

        assert_eq!(a.receive_message().await.unwrap(), "first");
        assert_eq!(a.receive_message().await.unwrap(), "second");
        assert_eq!(a.receive_message().await.unwrap(), "third");
    }

    #[tokio::test]
    async fn test_expect_flags_mismatch_with_both_tokens() {
        let (mut a, mut b) = pair().await;
        b.send_message("sabotage").await.unwrap();

        let err = a.expect_message(SGNL_READY).await.unwrap_err();
        match err {
            HarnessError::SyncMismatch { expected, received } => {
                assert_eq!(expected, SGNL_READY);
                assert_eq!(received, "sabotage");
            }
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rendezvous_completes_both_sides() {
        let (mut test_side, mut debuggee_side) = pair().await;

        let debuggee = tokio::spawn(async move { debuggee_side.rendezvous().await });
        test_side.release().await.unwrap();
        debuggee.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_peer_is_not_a_timeout() {
        let (mut a, b) = pair().await;
        drop(b);
        assert!(matches!(
            a.receive_message().await.unwrap_err(),
            HarnessError::SyncClosed
        ));
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let server = SyncServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let client = tokio::spawn(async move {
            SyncChannel::connect(&addr, Duration::from_millis(100)).await
        });
        let _held_open = server.accept(Duration::from_secs(2)).await.unwrap();
        let mut quiet = client.await.unwrap().unwrap();

        assert!(matches!(
            quiet.receive_message().await.unwrap_err(),
            HarnessError::SyncTimeout(_)
        ));
    }
}
