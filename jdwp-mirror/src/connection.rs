// JDWP connection management
//
// Handles TCP setup in both transport directions, the ASCII handshake, and
// demux loop startup

use crate::eventloop::{spawn_event_loop, EventLoopHandle};
use crate::protocol::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A live JDWP connection. Cloning shares the demux loop and the packet id
/// counter, so every clone draws ids from one sequence.
#[derive(Clone, Debug)]
pub struct JdwpConnection {
    event_loop: EventLoopHandle,
    next_id: Arc<AtomicU32>,
}

impl JdwpConnection {
    /// Attach to a debuggee VM that is listening for a debugger.
    ///
    /// Also yields the raw event packet lane; hand it to the event channel
    /// once ID sizes are negotiated.
    pub async fn attach(addr: &str) -> JdwpResult<(Self, mpsc::UnboundedReceiver<EventPacket>)> {
        info!("Attaching to JDWP endpoint at {}", addr);

        let mut stream = TcpStream::connect(addr).await?;
        Self::handshake(&mut stream).await?;

        Ok(Self::spawn(stream))
    }

    /// Listen-mode counterpart of [`attach`](Self::attach): take the next
    /// debuggee VM connecting to `listener`.
    pub async fn accept(
        listener: &TcpListener,
    ) -> JdwpResult<(Self, mpsc::UnboundedReceiver<EventPacket>)> {
        let (mut stream, peer) = listener.accept().await?;
        info!("Debuggee VM connected from {}", peer);

        Self::handshake(&mut stream).await?;

        Ok(Self::spawn(stream))
    }

    fn spawn(stream: TcpStream) -> (Self, mpsc::UnboundedReceiver<EventPacket>) {
        let (reader, writer) = stream.into_split();
        let (event_loop, event_rx) = spawn_event_loop(reader, writer);

        (
            Self {
                event_loop,
                next_id: Arc::new(AtomicU32::new(1)),
            },
            event_rx,
        )
    }

    /// Perform the JDWP handshake. The debugger side writes the ASCII tag
    /// first in both transport directions, then expects it echoed verbatim.
    async fn handshake(stream: &mut TcpStream) -> JdwpResult<()> {
        debug!("Performing JDWP handshake");

        stream.write_all(JDWP_HANDSHAKE).await?;
        stream.flush().await?;

        let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
        stream.read_exact(&mut buf).await?;

        if buf != JDWP_HANDSHAKE {
            warn!("Invalid handshake response: {:?}", buf);
            return Err(JdwpError::InvalidHandshake);
        }

        info!("JDWP handshake successful");
        Ok(())
    }

    /// Send a command and wait for its reply.
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        debug!("Sending command packet id={}", packet.id);
        self.event_loop.send_command(packet).await
    }

    /// Generate the next packet ID
    pub fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_id_sequence() {
        let counter = AtomicU32::new(1);

        assert_eq!(counter.fetch_add(1, Ordering::SeqCst), 1);
        assert_eq!(counter.fetch_add(1, Ordering::SeqCst), 2);
        assert_eq!(counter.fetch_add(1, Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
            sock.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, JDWP_HANDSHAKE);
            // Echo back something that is the right length but wrong bytes.
            sock.write_all(b"JDWP-Handsh?ke").await.unwrap();
        });

        let err = JdwpConnection::attach(&addr.to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, JdwpError::InvalidHandshake));

        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_succeeds_on_exact_echo() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(&buf).await.unwrap();
        });

        let (conn, _events) = JdwpConnection::attach(&addr.to_string()).await.unwrap();
        assert_eq!(conn.next_id(), 1);
        assert_eq!(conn.next_id(), 2);

        peer.await.unwrap();
    }
}
