// JDWP demultiplexing loop
//
// One task owns the socket. Outgoing commands arrive on an mpsc lane and park
// a oneshot sender under their packet id; inbound packets are split on the
// reply flag, replies routed to the parked waiter, composite event packets
// forwarded raw for the event channel to decode at negotiated ID widths.

use crate::protocol::{
    CommandPacket, EventPacket, JdwpError, JdwpResult, ReplyPacket, HEADER_SIZE, REPLY_FLAG,
};
use bytes::BytesMut;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Maximum allowed JDWP packet size (10MB)
/// This prevents memory exhaustion from malicious or buggy VMs
const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

/// Request to send a command and get the matching reply
pub struct CommandRequest {
    pub packet: CommandPacket,
    pub reply_tx: oneshot::Sender<JdwpResult<ReplyPacket>>,
}

/// Handle to the demux loop for sending commands
#[derive(Clone, Debug)]
pub struct EventLoopHandle {
    command_tx: mpsc::Sender<CommandRequest>,
}

impl EventLoopHandle {
    /// Send a command and wait for its reply to be routed back.
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        let (reply_tx, reply_rx) = oneshot::channel();

        let request = CommandRequest { packet, reply_tx };

        self.command_tx
            .send(request)
            .await
            .map_err(|_| JdwpError::ConnectionClosed)?;

        reply_rx.await.map_err(|_| JdwpError::ConnectionClosed)?
    }
}

/// Start the demux loop over a split socket.
///
/// The returned receiver carries raw composite event packets in arrival
/// order. The lane is unbounded so the reader never stalls behind a slow
/// consumer and no event is ever dropped.
pub fn spawn_event_loop(
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
) -> (EventLoopHandle, mpsc::UnboundedReceiver<EventPacket>) {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(event_loop_task(reader, writer, command_rx, event_tx));

    (EventLoopHandle { command_tx }, event_rx)
}

enum InboundPacket {
    Reply(ReplyPacket),
    Event(EventPacket),
}

async fn event_loop_task(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut command_rx: mpsc::Receiver<CommandRequest>,
    event_tx: mpsc::UnboundedSender<EventPacket>,
) {
    info!("Demux loop started");

    let mut pending_replies: HashMap<u32, oneshot::Sender<JdwpResult<ReplyPacket>>> =
        HashMap::new();

    loop {
        tokio::select! {
            // Outgoing commands
            Some(cmd) = command_rx.recv() => {
                let packet_id = cmd.packet.id;
                debug!("Sending command id={}", packet_id);

                let encoded = cmd.packet.encode();
                if let Err(e) = writer.write_all(&encoded).await {
                    error!("Failed to write command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                if let Err(e) = writer.flush().await {
                    error!("Failed to flush command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                pending_replies.insert(packet_id, cmd.reply_tx);
            }

            // Inbound packets
            result = read_packet(&mut reader) => {
                match result {
                    Ok(InboundPacket::Reply(reply)) => {
                        debug!("Received reply id={}", reply.id);

                        if let Some(tx) = pending_replies.remove(&reply.id) {
                            tx.send(Ok(reply)).ok();
                        } else {
                            warn!("Reply for unknown command id={}, dropping", reply.id);
                        }
                    }
                    Ok(InboundPacket::Event(packet)) => {
                        debug!(
                            "Received event packet id={}, {} data bytes",
                            packet.id,
                            packet.data.len()
                        );

                        if event_tx.send(packet).is_err() {
                            warn!("Event receiver dropped, discarding event packet");
                        }
                    }
                    Err(JdwpError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        info!("Peer closed the JDWP connection");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read packet: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Waiters parked for replies that can no longer arrive must not hang.
    for (id, tx) in pending_replies.drain() {
        debug!("Failing pending reply id={} on shutdown", id);
        tx.send(Err(JdwpError::ConnectionClosed)).ok();
    }

    info!("Demux loop shutting down");
}

/// Read one packet off the socket and classify it by the reply flag.
async fn read_packet(reader: &mut OwnedReadHalf) -> JdwpResult<InboundPacket> {
    let mut header = BytesMut::with_capacity(HEADER_SIZE);
    header.resize(HEADER_SIZE, 0);

    reader
        .read_exact(&mut header)
        .await
        .map_err(JdwpError::Io)?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let packet_id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[8];

    if length < HEADER_SIZE {
        return Err(JdwpError::Framing(format!("invalid packet length {length}")));
    }

    if length > MAX_PACKET_SIZE {
        return Err(JdwpError::Framing(format!(
            "packet too large: {length} bytes (max {MAX_PACKET_SIZE})"
        )));
    }

    let mut data = vec![0u8; length - HEADER_SIZE];
    if !data.is_empty() {
        reader.read_exact(&mut data).await.map_err(JdwpError::Io)?;
    }

    if flags & REPLY_FLAG != 0 {
        let mut full_packet = header.to_vec();
        full_packet.extend_from_slice(&data);
        Ok(InboundPacket::Reply(ReplyPacket::decode(&full_packet)?))
    } else {
        Ok(InboundPacket::Event(EventPacket {
            id: packet_id,
            command_set: header[9],
            command: header[10],
            data,
        }))
    }
}
