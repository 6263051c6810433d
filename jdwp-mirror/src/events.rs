// JDWP composite event decoding
//
// The VM reports everything that happens through composite event packets
// (command set 64, command 100). Decoding needs the negotiated ID sizes, so
// it happens here rather than in the demux loop.

use crate::commands::{command_sets, event_commands, event_kinds};
use crate::cursor::PacketCursor;
use crate::protocol::{EventPacket, JdwpError, JdwpResult};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One composite event packet: a suspend policy plus one or more events that
/// occurred at the same point in the debuggee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: SuspendPolicy,
    pub events: Vec<Event>,
}

/// Single event within an event set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: u8,
    pub request_id: i32,
    pub details: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VMStart {
        thread: ThreadId,
    },
    VMDeath,
    ThreadStart {
        thread: ThreadId,
    },
    ThreadDeath {
        thread: ThreadId,
    },
    ClassPrepare {
        thread: ThreadId,
        ref_type_tag: u8,
        type_id: ReferenceTypeId,
        signature: String,
        status: i32,
    },
    ClassUnload {
        signature: String,
    },
    Breakpoint {
        thread: ThreadId,
        location: Location,
    },
    Step {
        thread: ThreadId,
        location: Location,
    },
    Exception {
        thread: ThreadId,
        location: Location,
        exception: ObjectId,
        catch_location: Option<Location>,
    },
    MethodEntry {
        thread: ThreadId,
        location: Location,
    },
    MethodExit {
        thread: ThreadId,
        location: Location,
    },
    Unknown {
        kind: u8,
    },
}

impl EventKind {
    /// The thread an event occurred in, where the event carries one. Used to
    /// apply an EVENT_THREAD suspend policy.
    pub fn thread(&self) -> Option<ThreadId> {
        match self {
            EventKind::VMStart { thread }
            | EventKind::ThreadStart { thread }
            | EventKind::ThreadDeath { thread }
            | EventKind::ClassPrepare { thread, .. }
            | EventKind::Breakpoint { thread, .. }
            | EventKind::Step { thread, .. }
            | EventKind::Exception { thread, .. }
            | EventKind::MethodEntry { thread, .. }
            | EventKind::MethodExit { thread, .. } => Some(*thread),
            EventKind::VMDeath | EventKind::ClassUnload { .. } | EventKind::Unknown { .. } => None,
        }
    }
}

impl EventSet {
    /// Decode a composite event packet at the given ID widths.
    pub fn decode(packet: &EventPacket, sizes: IdSizes) -> JdwpResult<Self> {
        if packet.command_set != command_sets::EVENT || packet.command != event_commands::COMPOSITE
        {
            return Err(JdwpError::Framing(format!(
                "not a composite event packet: command {}/{}",
                packet.command_set, packet.command
            )));
        }

        let mut cursor = PacketCursor::new(&packet.data, sizes);

        let policy_byte = cursor.next_u8()?;
        let suspend_policy = SuspendPolicy::from_u8(policy_byte).ok_or_else(|| {
            JdwpError::Framing(format!("invalid suspend policy byte {policy_byte}"))
        })?;

        let event_count = cursor.next_i32()?;
        if event_count < 0 {
            return Err(JdwpError::Framing(format!(
                "negative event count {event_count}"
            )));
        }

        let mut events = Vec::with_capacity(event_count as usize);
        let mut saw_unknown = false;

        for _ in 0..event_count {
            let kind = cursor.next_u8()?;
            let request_id = cursor.next_i32()?;

            let details = match kind {
                event_kinds::VM_START => EventKind::VMStart {
                    thread: cursor.next_thread_id()?,
                },
                event_kinds::VM_DEATH => EventKind::VMDeath,
                event_kinds::THREAD_START => EventKind::ThreadStart {
                    thread: cursor.next_thread_id()?,
                },
                event_kinds::THREAD_DEATH => EventKind::ThreadDeath {
                    thread: cursor.next_thread_id()?,
                },
                event_kinds::CLASS_PREPARE => EventKind::ClassPrepare {
                    thread: cursor.next_thread_id()?,
                    ref_type_tag: cursor.next_u8()?,
                    type_id: cursor.next_reference_type_id()?,
                    signature: cursor.next_string()?,
                    status: cursor.next_i32()?,
                },
                event_kinds::CLASS_UNLOAD => EventKind::ClassUnload {
                    signature: cursor.next_string()?,
                },
                event_kinds::BREAKPOINT => EventKind::Breakpoint {
                    thread: cursor.next_thread_id()?,
                    location: cursor.next_location()?,
                },
                event_kinds::SINGLE_STEP => EventKind::Step {
                    thread: cursor.next_thread_id()?,
                    location: cursor.next_location()?,
                },
                event_kinds::EXCEPTION => {
                    let thread = cursor.next_thread_id()?;
                    let location = cursor.next_location()?;
                    let exception = cursor.next_object_id()?;
                    let catch = cursor.next_location()?;
                    EventKind::Exception {
                        thread,
                        location,
                        exception,
                        // An all-zero catch location means the exception is
                        // uncaught.
                        catch_location: if catch.class_id == 0 && catch.method_id == 0 {
                            None
                        } else {
                            Some(catch)
                        },
                    }
                }
                event_kinds::METHOD_ENTRY => EventKind::MethodEntry {
                    thread: cursor.next_thread_id()?,
                    location: cursor.next_location()?,
                },
                event_kinds::METHOD_EXIT => EventKind::MethodExit {
                    thread: cursor.next_thread_id()?,
                    location: cursor.next_location()?,
                },
                _ => {
                    // The field layout of an unrecognized kind is unknowable,
                    // so everything after it in the packet is opaque.
                    warn!(
                        "Unsupported event kind {} ({}), skipping rest of packet",
                        kind,
                        event_kinds::name(kind)
                    );
                    saw_unknown = true;
                    EventKind::Unknown { kind }
                }
            };

            events.push(Event {
                kind,
                request_id,
                details,
            });

            if saw_unknown {
                break;
            }
        }

        if !saw_unknown {
            cursor.expect_end()?;
        }

        Ok(EventSet {
            suspend_policy,
            events,
        })
    }

    pub fn has_kind(&self, kind: u8) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// The thread of the first event carrying one.
    pub fn event_thread(&self) -> Option<ThreadId> {
        self.events.iter().find_map(|e| e.details.thread())
    }
}
