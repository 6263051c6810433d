// EventRequest command set
//
// Requests tell the VM which occurrences to report as events and how to
// suspend when they fire.

use crate::commands::{command_sets, event_kinds, event_request_commands};
use crate::cursor::PacketWriter;
use crate::mirror::VmMirror;
use crate::protocol::JdwpResult;
use crate::types::{FieldId, Location, ObjectId, ReferenceTypeId, SuspendPolicy, ThreadId};

/// Filter attached to an event request. Modifiers are ANDed together.
#[derive(Debug, Clone)]
pub enum EventModifier {
    Count(i32),
    ThreadOnly(ThreadId),
    ClassOnly(ReferenceTypeId),
    ClassMatch(String),
    ClassExclude(String),
    LocationOnly(Location),
    ExceptionOnly {
        ref_type: ReferenceTypeId,
        caught: bool,
        uncaught: bool,
    },
    FieldOnly {
        ref_type: ReferenceTypeId,
        field_id: FieldId,
    },
    Step {
        thread: ThreadId,
        size: i32,
        depth: i32,
    },
    InstanceOnly(ObjectId),
}

impl EventModifier {
    fn encode(&self, w: &mut PacketWriter<'_>) {
        match self {
            EventModifier::Count(count) => {
                w.put_u8(1).put_i32(*count);
            }
            EventModifier::ThreadOnly(thread) => {
                w.put_u8(3).put_thread_id(*thread);
            }
            EventModifier::ClassOnly(ref_type) => {
                w.put_u8(4).put_reference_type_id(*ref_type);
            }
            EventModifier::ClassMatch(pattern) => {
                w.put_u8(5).put_string(pattern);
            }
            EventModifier::ClassExclude(pattern) => {
                w.put_u8(6).put_string(pattern);
            }
            EventModifier::LocationOnly(location) => {
                w.put_u8(7).put_location(location);
            }
            EventModifier::ExceptionOnly {
                ref_type,
                caught,
                uncaught,
            } => {
                w.put_u8(8)
                    .put_reference_type_id(*ref_type)
                    .put_bool(*caught)
                    .put_bool(*uncaught);
            }
            EventModifier::FieldOnly { ref_type, field_id } => {
                w.put_u8(9)
                    .put_reference_type_id(*ref_type)
                    .put_field_id(*field_id);
            }
            EventModifier::Step {
                thread,
                size,
                depth,
            } => {
                w.put_u8(10)
                    .put_thread_id(*thread)
                    .put_i32(*size)
                    .put_i32(*depth);
            }
            EventModifier::InstanceOnly(object) => {
                w.put_u8(11).put_object_id(*object);
            }
        }
    }
}

impl VmMirror {
    /// Ask the VM to report events of `kind` (EventRequest.Set). Returns the
    /// request id, which later events of this request carry.
    pub async fn set_event_request(
        &self,
        kind: u8,
        suspend_policy: SuspendPolicy,
        modifiers: &[EventModifier],
    ) -> JdwpResult<i32> {
        let mut data = Vec::new();
        let mut w = self.writer(&mut data);
        w.put_u8(kind)
            .put_u8(suspend_policy as u8)
            .put_i32(modifiers.len() as i32);
        for modifier in modifiers {
            modifier.encode(&mut w);
        }

        let reply = self
            .command(command_sets::EVENT_REQUEST, event_request_commands::SET, data)
            .await?;

        let mut cursor = self.cursor(&reply);
        let request_id = cursor.next_i32()?;
        cursor.expect_end()?;
        Ok(request_id)
    }

    /// Unfiltered THREAD_START request
    pub async fn set_thread_start_request(
        &self,
        suspend_policy: SuspendPolicy,
    ) -> JdwpResult<i32> {
        self.set_event_request(event_kinds::THREAD_START, suspend_policy, &[])
            .await
    }

    /// Unfiltered THREAD_DEATH request
    pub async fn set_thread_death_request(
        &self,
        suspend_policy: SuspendPolicy,
    ) -> JdwpResult<i32> {
        self.set_event_request(event_kinds::THREAD_DEATH, suspend_policy, &[])
            .await
    }

    /// Drop an event request (EventRequest.Clear). Events already reported
    /// may still be in flight.
    pub async fn clear_event_request(&self, kind: u8, request_id: i32) -> JdwpResult<()> {
        let mut data = Vec::new();
        self.writer(&mut data).put_u8(kind).put_i32(request_id);

        self.command(command_sets::EVENT_REQUEST, event_request_commands::CLEAR, data)
            .await?;
        Ok(())
    }

    /// Drop every breakpoint request at once
    /// (EventRequest.ClearAllBreakpoints)
    pub async fn clear_all_breakpoints(&self) -> JdwpResult<()> {
        self.command(
            command_sets::EVENT_REQUEST,
            event_request_commands::CLEAR_ALL_BREAKPOINTS,
            Vec::new(),
        )
        .await?;
        Ok(())
    }
}
