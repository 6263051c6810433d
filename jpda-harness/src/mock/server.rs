// Wire side of the mock debuggee VM
//
// Speaks the VM half of JDWP over one socket: answers the handshake,
// decodes command packets and dispatches them against the VM state, and
// emits composite event packets when the scenario driver says a thread
// started or died. Command handling is pure (state in, reply bytes out),
// so it is unit-tested here without a socket.

use super::vmstate::{
    EventRequest, VmState, BASE_DIR, MAIN_GROUP_ID, MAIN_THREAD_ID, VM_NAME, VM_VERSION,
};
use crate::error::HarnessResult;
use bytes::BytesMut;
use jdwp_mirror::commands::{
    command_name, command_sets, error_codes, event_commands, event_kinds,
    event_request_commands, object_reference_commands, string_reference_commands,
    thread_commands, vm_commands,
};
use jdwp_mirror::cursor::{PacketCursor, PacketWriter};
use jdwp_mirror::protocol::{
    error_name, CommandPacket, JdwpError, JdwpResult, ReplyPacket, HEADER_SIZE, JDWP_HANDSHAKE,
};
use jdwp_mirror::types::{IdSizes, SuspendPolicy, ThreadId};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Largest command packet the mock will read.
const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

/// Instructions from the scenario driver to the serve loop.
#[derive(Debug)]
pub enum ScenarioOp {
    /// Bring the worker threads up, reporting THREAD_START per request.
    StartWorkers { done: oneshot::Sender<()> },
    /// Let the worker threads die, reporting THREAD_DEATH per request.
    KillWorkers { done: oneshot::Sender<()> },
}

/// What the serve loop does after writing a reply.
#[derive(Debug)]
enum PostAction {
    Continue,
    /// ReleaseEvents: write the queued event packets now.
    ReleaseHeld(Vec<Vec<u8>>),
    /// Dispose: the session is over, close the connection.
    CloseConnection,
    /// Exit: terminate the whole process with this code.
    ExitProcess(i32),
}

type HandlerResult = Result<(Vec<u8>, PostAction), u16>;

/// Drive one debugging session over `stream`. Completes when the debugger
/// disconnects or disposes (`None`) or asks the VM to exit (`Some(code)`).
/// Closing the op channel ends the scenario: the VM reports VM_DEATH and
/// hangs up.
pub async fn run_mock_vm(
    stream: TcpStream,
    mut state: VmState,
    mut ops: mpsc::Receiver<ScenarioOp>,
) -> HarnessResult<Option<i32>> {
    let (mut reader, mut writer) = stream.into_split();

    // VM side of the handshake: the debugger speaks first, we echo.
    let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
    reader.read_exact(&mut buf).await?;
    if buf != JDWP_HANDSHAKE {
        warn!("Bad handshake from debugger: {:?}", buf);
        return Err(JdwpError::InvalidHandshake.into());
    }
    writer.write_all(JDWP_HANDSHAKE).await?;
    writer.flush().await?;
    info!("Debugger attached");

    let mut next_event_id: u32 = 1;

    // VM_START goes out unrequested, like a real VM announcing itself.
    let hello = composite_event(
        &mut next_event_id,
        SuspendPolicy::None,
        event_kinds::VM_START,
        0,
        Some(MAIN_THREAD_ID),
    );
    writer.write_all(&hello).await?;
    writer.flush().await?;

    loop {
        tokio::select! {
            op = ops.recv() => match op {
                Some(op) => handle_op(op, &mut state, &mut writer, &mut next_event_id).await?,
                None => {
                    let death = composite_event(
                        &mut next_event_id,
                        SuspendPolicy::None,
                        event_kinds::VM_DEATH,
                        0,
                        None,
                    );
                    writer.write_all(&death).await?;
                    writer.flush().await?;
                    info!("Scenario complete, closing session");
                    return Ok(None);
                }
            },
            result = read_command(&mut reader) => {
                let packet = match result {
                    Ok(packet) => packet,
                    Err(JdwpError::Io(ref e))
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        info!("Debugger disconnected");
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                };

                debug!(
                    "{} id={}",
                    command_name(packet.command_set, packet.command),
                    packet.id
                );

                let (reply, action) = dispatch(&mut state, &packet);
                writer.write_all(&reply.encode()).await?;

                match action {
                    PostAction::Continue => {
                        writer.flush().await?;
                    }
                    PostAction::ReleaseHeld(packets) => {
                        info!("Releasing {} held event packets", packets.len());
                        for held in packets {
                            writer.write_all(&held).await?;
                        }
                        writer.flush().await?;
                    }
                    PostAction::CloseConnection => {
                        writer.flush().await?;
                        info!("Session disposed by the debugger");
                        return Ok(None);
                    }
                    PostAction::ExitProcess(code) => {
                        let death = composite_event(
                            &mut next_event_id,
                            SuspendPolicy::None,
                            event_kinds::VM_DEATH,
                            0,
                            None,
                        );
                        writer.write_all(&death).await?;
                        writer.flush().await?;
                        info!("Exit requested with code {}", code);
                        return Ok(Some(code));
                    }
                }
            }
        }
    }
}

async fn handle_op(
    op: ScenarioOp,
    state: &mut VmState,
    writer: &mut OwnedWriteHalf,
    next_event_id: &mut u32,
) -> HarnessResult<()> {
    match op {
        ScenarioOp::StartWorkers { done } => {
            let started = state.start_workers();
            info!("Started {} worker threads", started.len());
            let requests = state.requests_for(event_kinds::THREAD_START);
            for thread in started {
                announce_thread_event(
                    state,
                    writer,
                    next_event_id,
                    event_kinds::THREAD_START,
                    &requests,
                    thread,
                )
                .await?;
            }
            writer.flush().await?;
            let _ = done.send(());
        }
        ScenarioOp::KillWorkers { done } => {
            let requests = state.requests_for(event_kinds::THREAD_DEATH);
            let dying: Vec<ThreadId> = state
                .alive_threads()
                .into_iter()
                .filter(|t| *t != MAIN_THREAD_ID)
                .collect();
            // Report each death while the thread still answers commands,
            // then let it go.
            for thread in dying {
                announce_thread_event(
                    state,
                    writer,
                    next_event_id,
                    event_kinds::THREAD_DEATH,
                    &requests,
                    thread,
                )
                .await?;
            }
            let died = state.kill_workers();
            info!("{} worker threads died", died.len());
            writer.flush().await?;
            let _ = done.send(());
        }
    }
    Ok(())
}

/// One thread occurrence: fold every matching request into a single
/// composite with the strongest suspend policy among them, apply that
/// policy to the VM state, and push the packet through the hold gate.
async fn announce_thread_event(
    state: &mut VmState,
    writer: &mut OwnedWriteHalf,
    next_event_id: &mut u32,
    kind: u8,
    requests: &[EventRequest],
    thread: ThreadId,
) -> HarnessResult<()> {
    if requests.is_empty() {
        return Ok(());
    }

    let policy = strongest_policy(requests);
    state.apply_event_policy(policy, Some(thread));

    let mut data = Vec::new();
    let mut w = PacketWriter::new(&mut data, IdSizes::default());
    w.put_u8(policy as u8).put_i32(requests.len() as i32);
    for request in requests {
        w.put_u8(kind).put_i32(request.id).put_thread_id(thread);
    }

    let packet = event_packet(next_event_id, data);
    if let Some(bytes) = state.gate_event(packet) {
        writer.write_all(&bytes).await?;
    } else {
        debug!("{} for thread {:#x} held", event_kinds::name(kind), thread);
    }
    Ok(())
}

fn strongest_policy(requests: &[EventRequest]) -> SuspendPolicy {
    requests
        .iter()
        .map(|r| r.policy)
        .max_by_key(|p| *p as u8)
        .unwrap_or(SuspendPolicy::None)
}

/// A one-event composite packet, used for the automatic lifecycle events.
fn composite_event(
    next_event_id: &mut u32,
    policy: SuspendPolicy,
    kind: u8,
    request_id: i32,
    thread: Option<ThreadId>,
) -> Vec<u8> {
    let mut data = Vec::new();
    let mut w = PacketWriter::new(&mut data, IdSizes::default());
    w.put_u8(policy as u8)
        .put_i32(1)
        .put_u8(kind)
        .put_i32(request_id);
    if let Some(thread) = thread {
        w.put_thread_id(thread);
    }
    event_packet(next_event_id, data)
}

fn event_packet(next_event_id: &mut u32, data: Vec<u8>) -> Vec<u8> {
    let mut packet = CommandPacket::new(
        *next_event_id,
        command_sets::EVENT,
        event_commands::COMPOSITE,
    );
    *next_event_id = next_event_id.wrapping_add(1);
    packet.data = data;
    packet.encode()
}

async fn read_command(reader: &mut OwnedReadHalf) -> JdwpResult<CommandPacket> {
    let mut header = BytesMut::with_capacity(HEADER_SIZE);
    header.resize(HEADER_SIZE, 0);
    reader.read_exact(&mut header).await.map_err(JdwpError::Io)?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if length < HEADER_SIZE {
        return Err(JdwpError::Framing(format!("invalid packet length {length}")));
    }
    if length > MAX_PACKET_SIZE {
        return Err(JdwpError::Framing(format!(
            "packet too large: {length} bytes (max {MAX_PACKET_SIZE})"
        )));
    }

    let mut packet = BytesMut::with_capacity(length);
    packet.extend_from_slice(&header);
    packet.resize(length, 0);
    if length > HEADER_SIZE {
        reader
            .read_exact(&mut packet[HEADER_SIZE..])
            .await
            .map_err(JdwpError::Io)?;
    }

    CommandPacket::decode(&packet)
}

/// Decode, execute, and encode one command. A handler error code becomes
/// an error reply with an empty body.
fn dispatch(state: &mut VmState, packet: &CommandPacket) -> (ReplyPacket, PostAction) {
    let result = match (packet.command_set, packet.command) {
        (command_sets::VIRTUAL_MACHINE, command) => on_virtual_machine(state, command, packet),
        (command_sets::OBJECT_REFERENCE, object_reference_commands::REFERENCE_TYPE) => {
            on_object_reference_type(state, packet)
        }
        (command_sets::STRING_REFERENCE, string_reference_commands::VALUE) => {
            on_string_value(state, packet)
        }
        (command_sets::THREAD_REFERENCE, command) => on_thread_reference(state, command, packet),
        (command_sets::EVENT_REQUEST, command) => on_event_request(state, command, packet),
        _ => Err(error_codes::NOT_IMPLEMENTED),
    };

    match result {
        Ok((data, action)) => {
            let mut reply = ReplyPacket::new(packet.id, error_codes::NONE);
            reply.data = data;
            (reply, action)
        }
        Err(code) => {
            debug!(
                "{} answered {}",
                command_name(packet.command_set, packet.command),
                error_name(code)
            );
            (ReplyPacket::new(packet.id, code), PostAction::Continue)
        }
    }
}

fn on_virtual_machine(state: &mut VmState, command: u8, packet: &CommandPacket) -> HandlerResult {
    let sizes = IdSizes::default();
    match command {
        vm_commands::VERSION => {
            let mut out = Vec::new();
            PacketWriter::new(&mut out, sizes)
                .put_string("Mock JDWP debuggee VM")
                .put_i32(1)
                .put_i32(6)
                .put_string(VM_VERSION)
                .put_string(VM_NAME);
            Ok((out, PostAction::Continue))
        }
        vm_commands::CLASSES_BY_SIGNATURE => {
            let mut cursor = PacketCursor::new(&packet.data, sizes);
            let signature = cursor
                .next_string()
                .map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            let matches = state.classes_by_signature(&signature);

            let mut out = Vec::new();
            let mut w = PacketWriter::new(&mut out, sizes);
            w.put_i32(matches.len() as i32);
            for class in matches {
                w.put_u8(class.tag)
                    .put_reference_type_id(class.id)
                    .put_i32(class.status);
            }
            Ok((out, PostAction::Continue))
        }
        vm_commands::ALL_CLASSES => {
            let mut out = Vec::new();
            let mut w = PacketWriter::new(&mut out, sizes);
            w.put_i32(state.classes().len() as i32);
            for class in state.classes() {
                w.put_u8(class.tag)
                    .put_reference_type_id(class.id)
                    .put_string(class.signature)
                    .put_i32(class.status);
            }
            Ok((out, PostAction::Continue))
        }
        vm_commands::ALL_CLASSES_WITH_GENERIC => {
            let mut out = Vec::new();
            let mut w = PacketWriter::new(&mut out, sizes);
            w.put_i32(state.classes().len() as i32);
            for class in state.classes() {
                w.put_u8(class.tag)
                    .put_reference_type_id(class.id)
                    .put_string(class.signature)
                    // No generic signature is an empty string on the wire.
                    .put_string(class.generic.unwrap_or(""))
                    .put_i32(class.status);
            }
            Ok((out, PostAction::Continue))
        }
        vm_commands::ALL_THREADS => {
            let threads = state.alive_threads();
            let mut out = Vec::new();
            let mut w = PacketWriter::new(&mut out, sizes);
            w.put_i32(threads.len() as i32);
            for thread in threads {
                w.put_thread_id(thread);
            }
            Ok((out, PostAction::Continue))
        }
        vm_commands::TOP_LEVEL_THREAD_GROUPS => {
            let mut out = Vec::new();
            PacketWriter::new(&mut out, sizes)
                .put_i32(1)
                .put_thread_group_id(MAIN_GROUP_ID);
            Ok((out, PostAction::Continue))
        }
        vm_commands::DISPOSE => Ok((Vec::new(), PostAction::CloseConnection)),
        vm_commands::ID_SIZES => {
            // The mock always reports the widest (and default) 8-byte ids.
            let mut out = Vec::new();
            PacketWriter::new(&mut out, sizes)
                .put_i32(8)
                .put_i32(8)
                .put_i32(8)
                .put_i32(8)
                .put_i32(8);
            Ok((out, PostAction::Continue))
        }
        vm_commands::SUSPEND => {
            state.suspend_all();
            Ok((Vec::new(), PostAction::Continue))
        }
        vm_commands::RESUME => {
            state.resume_all();
            Ok((Vec::new(), PostAction::Continue))
        }
        vm_commands::EXIT => {
            let mut cursor = PacketCursor::new(&packet.data, sizes);
            let code = cursor.next_i32().map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            Ok((Vec::new(), PostAction::ExitProcess(code)))
        }
        vm_commands::CREATE_STRING => {
            let mut cursor = PacketCursor::new(&packet.data, sizes);
            let value = cursor
                .next_string()
                .map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            let id = state.create_string(&value);

            let mut out = Vec::new();
            PacketWriter::new(&mut out, sizes).put_string_id(id);
            Ok((out, PostAction::Continue))
        }
        vm_commands::CAPABILITIES => {
            let mut out = Vec::new();
            let mut w = PacketWriter::new(&mut out, sizes);
            for _ in 0..7 {
                w.put_bool(false);
            }
            Ok((out, PostAction::Continue))
        }
        vm_commands::CAPABILITIES_NEW => {
            // Flag 15 is canGetInstanceInfo, the only capability the mock
            // backs with a real implementation.
            let mut out = Vec::new();
            let mut w = PacketWriter::new(&mut out, sizes);
            for index in 0..32 {
                w.put_bool(index == 15);
            }
            Ok((out, PostAction::Continue))
        }
        vm_commands::CLASS_PATHS => {
            let mut out = Vec::new();
            PacketWriter::new(&mut out, sizes)
                .put_string(BASE_DIR)
                .put_i32(1)
                .put_string("classes")
                .put_i32(1)
                .put_string("lib/boot.jar");
            Ok((out, PostAction::Continue))
        }
        vm_commands::DISPOSE_OBJECTS => {
            let mut cursor = PacketCursor::new(&packet.data, sizes);
            let count = cursor.next_i32().map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            for _ in 0..count {
                let object = cursor
                    .next_object_id()
                    .map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
                let refs = cursor.next_i32().map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
                state.dispose_object(object, refs);
            }
            Ok((Vec::new(), PostAction::Continue))
        }
        vm_commands::HOLD_EVENTS => {
            state.hold_events();
            Ok((Vec::new(), PostAction::Continue))
        }
        vm_commands::RELEASE_EVENTS => {
            let held = state.release_events();
            Ok((Vec::new(), PostAction::ReleaseHeld(held)))
        }
        vm_commands::INSTANCE_COUNTS => {
            let mut cursor = PacketCursor::new(&packet.data, sizes);
            let count = cursor.next_i32().map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            let mut out = Vec::new();
            let mut w = PacketWriter::new(&mut out, sizes);
            w.put_i32(count);
            for _ in 0..count {
                let type_id = cursor
                    .next_reference_type_id()
                    .map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
                w.put_i64(state.instance_count(type_id));
            }
            Ok((out, PostAction::Continue))
        }
        // The mock has no class redefinition or stratum support, exactly
        // like a VM without those capabilities.
        vm_commands::REDEFINE_CLASSES | vm_commands::SET_DEFAULT_STRATUM => {
            Err(error_codes::NOT_IMPLEMENTED)
        }
        _ => Err(error_codes::NOT_IMPLEMENTED),
    }
}

fn on_object_reference_type(state: &mut VmState, packet: &CommandPacket) -> HandlerResult {
    let mut cursor = PacketCursor::new(&packet.data, IdSizes::default());
    let object = cursor
        .next_object_id()
        .map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
    let (tag, type_id) = state.object_type(object)?;

    let mut out = Vec::new();
    PacketWriter::new(&mut out, IdSizes::default())
        .put_u8(tag)
        .put_reference_type_id(type_id);
    Ok((out, PostAction::Continue))
}

fn on_string_value(state: &mut VmState, packet: &CommandPacket) -> HandlerResult {
    let mut cursor = PacketCursor::new(&packet.data, IdSizes::default());
    let string = cursor
        .next_string_id()
        .map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
    let value = state.string_value(string)?;

    let mut out = Vec::new();
    PacketWriter::new(&mut out, IdSizes::default()).put_string(&value);
    Ok((out, PostAction::Continue))
}

fn on_thread_reference(state: &mut VmState, command: u8, packet: &CommandPacket) -> HandlerResult {
    let mut cursor = PacketCursor::new(&packet.data, IdSizes::default());
    let thread = cursor
        .next_thread_id()
        .map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;

    let mut out = Vec::new();
    let mut w = PacketWriter::new(&mut out, IdSizes::default());
    match command {
        thread_commands::NAME => {
            w.put_string(&state.thread_name(thread)?);
        }
        thread_commands::SUSPEND => state.suspend_thread(thread)?,
        thread_commands::RESUME => state.resume_thread(thread)?,
        thread_commands::STATUS => {
            let (thread_status, suspend_status) = state.thread_status(thread)?;
            w.put_i32(thread_status).put_i32(suspend_status);
        }
        thread_commands::SUSPEND_COUNT => {
            w.put_i32(state.suspend_count(thread)?);
        }
        _ => return Err(error_codes::NOT_IMPLEMENTED),
    }
    Ok((out, PostAction::Continue))
}

fn on_event_request(state: &mut VmState, command: u8, packet: &CommandPacket) -> HandlerResult {
    let mut cursor = PacketCursor::new(&packet.data, IdSizes::default());
    match command {
        event_request_commands::SET => {
            let kind = cursor.next_u8().map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            if event_kinds::name(kind) == "UNKNOWN" {
                return Err(error_codes::INVALID_EVENT_TYPE);
            }
            let policy = cursor
                .next_u8()
                .ok()
                .and_then(SuspendPolicy::from_u8)
                .ok_or(error_codes::ILLEGAL_ARGUMENT)?;
            // Modifier payloads are accepted unparsed; the mock reports
            // unfiltered events regardless.
            let request_id = state.add_request(kind, policy);
            info!(
                "Event request {} set: {} policy {:?}",
                request_id,
                event_kinds::name(kind),
                policy
            );

            let mut out = Vec::new();
            PacketWriter::new(&mut out, IdSizes::default()).put_i32(request_id);
            Ok((out, PostAction::Continue))
        }
        event_request_commands::CLEAR => {
            let kind = cursor.next_u8().map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            let request_id = cursor.next_i32().map_err(|_| error_codes::ILLEGAL_ARGUMENT)?;
            state.clear_request(kind, request_id)?;
            Ok((Vec::new(), PostAction::Continue))
        }
        event_request_commands::CLEAR_ALL_BREAKPOINTS => {
            state.clear_all_breakpoints();
            Ok((Vec::new(), PostAction::Continue))
        }
        _ => Err(error_codes::NOT_IMPLEMENTED),
    }
}
