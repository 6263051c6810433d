// The debugger-side mirror of an attached VM
//
// Owns the negotiated session state: ID widths from the IDSizes exchange,
// the capability set, per-thread suspend counts, and the deadlines applied
// to every reply and event wait. Command wrappers for the individual JDWP
// command sets hang off this type in their own modules.

use crate::channel::EventChannel;
use crate::commands::{command_name, command_sets, error_codes, vm_commands};
use crate::connection::JdwpConnection;
use crate::cursor::{PacketCursor, PacketWriter};
use crate::protocol::{error_name, CommandPacket, EventPacket, JdwpError, JdwpResult, ReplyPacket};
use crate::suspend::SuspendTracker;
use crate::types::{Capabilities, IdSizes};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Deadlines applied to every wait against the VM. Nothing in the mirror
/// blocks forever.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// How long a command may wait for its reply.
    pub reply: Duration,
    /// Default wait for event delivery.
    pub event: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            reply: Duration::from_secs(10),
            event: Duration::from_secs(10),
        }
    }
}

/// Result of a command whose call site declared some error codes as
/// acceptable. Forces the caller to look before touching the reply data.
#[derive(Debug)]
pub enum ReplyOutcome {
    /// Success; the reply body is intact and readable.
    Reply(ReplyPacket),
    /// The VM answered with one of the declared error codes.
    ExpectedError { code: u16, name: &'static str },
}

impl ReplyOutcome {
    pub fn is_expected_error(&self) -> bool {
        matches!(self, ReplyOutcome::ExpectedError { .. })
    }

    pub fn into_reply(self) -> Option<ReplyPacket> {
        match self {
            ReplyOutcome::Reply(reply) => Some(reply),
            ReplyOutcome::ExpectedError { .. } => None,
        }
    }
}

/// A live debugging session with one VM. Cheap to clone; clones share the
/// connection, the suspend tracker, and the negotiated session state.
#[derive(Clone)]
pub struct VmMirror {
    connection: JdwpConnection,
    id_sizes: IdSizes,
    capabilities: Capabilities,
    suspend: Arc<Mutex<SuspendTracker>>,
    timeouts: Timeouts,
}

impl VmMirror {
    /// Attach to a listening VM and negotiate the session.
    pub async fn attach(addr: &str, timeouts: Timeouts) -> JdwpResult<(Self, EventChannel)> {
        let (connection, raw_events) = JdwpConnection::attach(addr).await?;
        Self::handshake(connection, raw_events, timeouts).await
    }

    /// Accept a VM connecting to `listener` and negotiate the session.
    pub async fn accept(
        listener: &TcpListener,
        timeouts: Timeouts,
    ) -> JdwpResult<(Self, EventChannel)> {
        let (connection, raw_events) = JdwpConnection::accept(listener).await?;
        Self::handshake(connection, raw_events, timeouts).await
    }

    /// Negotiate session state over a fresh connection: fetch ID sizes,
    /// then the capability set. Event decoding needs the ID sizes, so the
    /// event channel is only built once negotiation is done.
    pub async fn handshake(
        connection: JdwpConnection,
        raw_events: mpsc::UnboundedReceiver<EventPacket>,
        timeouts: Timeouts,
    ) -> JdwpResult<(Self, EventChannel)> {
        let mut mirror = Self {
            connection,
            id_sizes: IdSizes::default(),
            capabilities: Capabilities::default(),
            suspend: Arc::new(Mutex::new(SuspendTracker::new())),
            timeouts,
        };

        mirror.id_sizes = mirror.fetch_id_sizes().await?;
        info!(
            "Negotiated ID sizes: object={} reference_type={} method={} field={} frame={}",
            mirror.id_sizes.object_id_size,
            mirror.id_sizes.reference_type_id_size,
            mirror.id_sizes.method_id_size,
            mirror.id_sizes.field_id_size,
            mirror.id_sizes.frame_id_size,
        );

        mirror.capabilities = mirror.fetch_capabilities().await?;

        let channel = EventChannel::new(
            raw_events,
            mirror.id_sizes,
            mirror.suspend.clone(),
            mirror.timeouts.event,
        );

        Ok((mirror, channel))
    }

    async fn fetch_id_sizes(&self) -> JdwpResult<IdSizes> {
        let reply = self
            .command(command_sets::VIRTUAL_MACHINE, vm_commands::ID_SIZES, Vec::new())
            .await?;

        // The IDSizes reply is five i32s, no ID-width fields involved.
        let mut cursor = PacketCursor::new(reply.data(), IdSizes::default());
        let sizes = IdSizes::new(
            cursor.next_i32()?,
            cursor.next_i32()?,
            cursor.next_i32()?,
            cursor.next_i32()?,
            cursor.next_i32()?,
        )?;
        cursor.expect_end()?;
        Ok(sizes)
    }

    /// CapabilitiesNew where the VM has it, with fallback to the original
    /// seven-flag Capabilities command on NOT_IMPLEMENTED.
    async fn fetch_capabilities(&self) -> JdwpResult<Capabilities> {
        let outcome = self
            .command_tolerating(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::CAPABILITIES_NEW,
                Vec::new(),
                &[error_codes::NOT_IMPLEMENTED],
            )
            .await?;

        match outcome {
            ReplyOutcome::Reply(reply) => {
                let mut cursor = self.cursor(&reply);
                let mut flags = [false; 32];
                for flag in flags.iter_mut() {
                    *flag = cursor.next_bool()?;
                }
                cursor.expect_end()?;
                Ok(Capabilities::from_new(flags))
            }
            ReplyOutcome::ExpectedError { .. } => {
                warn!("CapabilitiesNew not implemented, falling back to Capabilities");
                let reply = self
                    .command(
                        command_sets::VIRTUAL_MACHINE,
                        vm_commands::CAPABILITIES,
                        Vec::new(),
                    )
                    .await?;
                let mut cursor = self.cursor(&reply);
                let mut flags = [false; 7];
                for flag in flags.iter_mut() {
                    *flag = cursor.next_bool()?;
                }
                cursor.expect_end()?;
                Ok(Capabilities::from_basic(flags))
            }
        }
    }

    /// Send one command and insist on a clean reply.
    pub(crate) async fn command(
        &self,
        command_set: u8,
        command: u8,
        data: Vec<u8>,
    ) -> JdwpResult<ReplyPacket> {
        let reply = self.perform_command(command_set, command, data).await?;
        Self::check_reply(reply, &command_name(command_set, command))
    }

    /// Send one command, treating the listed error codes as an expected
    /// outcome rather than a failure.
    pub(crate) async fn command_tolerating(
        &self,
        command_set: u8,
        command: u8,
        data: Vec<u8>,
        tolerated: &[u16],
    ) -> JdwpResult<ReplyOutcome> {
        let reply = self.perform_command(command_set, command, data).await?;

        if reply.is_error() && tolerated.contains(&reply.error_code) {
            debug!(
                "{} answered {} ({}), declared tolerable",
                command_name(command_set, command),
                reply.error_name(),
                reply.error_code
            );
            return Ok(ReplyOutcome::ExpectedError {
                code: reply.error_code,
                name: reply.error_name(),
            });
        }

        Self::check_reply(reply, &command_name(command_set, command)).map(ReplyOutcome::Reply)
    }

    /// Raw send: correlate by id and bound the wait. Every reply path in the
    /// crate funnels through here.
    async fn perform_command(
        &self,
        command_set: u8,
        command: u8,
        data: Vec<u8>,
    ) -> JdwpResult<ReplyPacket> {
        let mut packet = CommandPacket::new(self.connection.next_id(), command_set, command);
        packet.data = data;

        match tokio::time::timeout(self.timeouts.reply, self.connection.send_command(packet)).await
        {
            Ok(result) => result,
            // The parked oneshot is dropped with this future; a reply that
            // straggles in later is logged and discarded by the demux loop.
            Err(_) => Err(JdwpError::Timeout {
                waited: self.timeouts.reply,
                what: format!("reply to {}", command_name(command_set, command)),
            }),
        }
    }

    /// Turn a non-zero reply error code into a typed error.
    pub(crate) fn check_reply(reply: ReplyPacket, context: &str) -> JdwpResult<ReplyPacket> {
        if reply.is_error() {
            warn!("{} failed: {}", context, reply.dump());
            return Err(JdwpError::ErrorCode {
                code: reply.error_code,
                name: error_name(reply.error_code),
                context: context.to_string(),
            });
        }
        Ok(reply)
    }

    /// Cursor over a reply body at this session's ID widths.
    pub(crate) fn cursor<'a>(&self, reply: &'a ReplyPacket) -> PacketCursor<'a> {
        PacketCursor::new(reply.data(), self.id_sizes)
    }

    /// Writer for a command body at this session's ID widths.
    pub(crate) fn writer<'a>(&self, buf: &'a mut Vec<u8>) -> PacketWriter<'a> {
        PacketWriter::new(buf, self.id_sizes)
    }

    pub fn id_sizes(&self) -> IdSizes {
        self.id_sizes
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Snapshot of the suspend bookkeeping as of now.
    pub async fn suspend_state(&self) -> SuspendTracker {
        self.suspend.lock().await.clone()
    }

    pub(crate) fn suspend_handle(&self) -> &Arc<Mutex<SuspendTracker>> {
        &self.suspend
    }
}
