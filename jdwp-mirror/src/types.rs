// Shared JDWP data model
//
// IDs, negotiated sizes, capability flags, and the status enums carried in
// ThreadReference.Status replies and event suspend policies.

use crate::protocol::{JdwpError, JdwpResult};
use serde::{Deserialize, Serialize};

// Untagged object-flavored IDs; the wire width comes from IdSizes, the
// in-memory form is always u64.
pub type ObjectId = u64;
pub type ThreadId = ObjectId;
pub type ThreadGroupId = ObjectId;
pub type StringId = ObjectId;

pub type ReferenceTypeId = u64;
pub type MethodId = u64;
pub type FieldId = u64;
pub type FrameId = u64;

/// Byte widths for ID fields, negotiated once per session via
/// VirtualMachine.IDSizes and immutable afterwards. Threaded explicitly into
/// every cursor and writer; there is no ambient copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSizes {
    pub field_id_size: u8,
    pub method_id_size: u8,
    pub object_id_size: u8,
    pub reference_type_id_size: u8,
    pub frame_id_size: u8,
}

impl IdSizes {
    /// Validates the five widths from an IDSizes reply. Anything outside
    /// 1..=8 cannot be carried in a u64 and is rejected up front.
    pub fn new(
        field_id_size: i32,
        method_id_size: i32,
        object_id_size: i32,
        reference_type_id_size: i32,
        frame_id_size: i32,
    ) -> JdwpResult<Self> {
        let check = |name: &str, v: i32| -> JdwpResult<u8> {
            if (1..=8).contains(&v) {
                Ok(v as u8)
            } else {
                Err(JdwpError::Framing(format!(
                    "unsupported {name} ID size: {v}"
                )))
            }
        };

        Ok(Self {
            field_id_size: check("field", field_id_size)?,
            method_id_size: check("method", method_id_size)?,
            object_id_size: check("object", object_id_size)?,
            reference_type_id_size: check("referenceType", reference_type_id_size)?,
            frame_id_size: check("frame", frame_id_size)?,
        })
    }
}

impl Default for IdSizes {
    /// 8-byte IDs everywhere, the assumption before negotiation completes.
    fn default() -> Self {
        Self {
            field_id_size: 8,
            method_id_size: 8,
            object_id_size: 8,
            reference_type_id_size: 8,
            frame_id_size: 8,
        }
    }
}

/// Optional-feature flags fetched once via CapabilitiesNew (or the seven-flag
/// Capabilities on older VMs) and cached read-only on the mirror. Tests
/// consult these to skip capability-gated scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_watch_field_modification: bool,
    pub can_watch_field_access: bool,
    pub can_get_bytecodes: bool,
    pub can_get_synthetic_attribute: bool,
    pub can_get_owned_monitor_info: bool,
    pub can_get_current_contended_monitor: bool,
    pub can_get_monitor_info: bool,
    pub can_redefine_classes: bool,
    pub can_add_method: bool,
    pub can_unrestrictedly_redefine_classes: bool,
    pub can_pop_frames: bool,
    pub can_use_instance_filters: bool,
    pub can_get_source_debug_extension: bool,
    pub can_request_vm_death_event: bool,
    pub can_set_default_stratum: bool,
    pub can_get_instance_info: bool,
    pub can_request_monitor_events: bool,
    pub can_get_monitor_frame_info: bool,
    pub can_use_source_name_filters: bool,
    pub can_get_constant_pool: bool,
    pub can_force_early_return: bool,
    /// Slots 22..=32 of the CapabilitiesNew reply, reserved for future use.
    pub reserved: [bool; 11],
}

impl Capabilities {
    /// From the seven flags of the original Capabilities command.
    pub fn from_basic(flags: [bool; 7]) -> Self {
        Self {
            can_watch_field_modification: flags[0],
            can_watch_field_access: flags[1],
            can_get_bytecodes: flags[2],
            can_get_synthetic_attribute: flags[3],
            can_get_owned_monitor_info: flags[4],
            can_get_current_contended_monitor: flags[5],
            can_get_monitor_info: flags[6],
            ..Self::default()
        }
    }

    /// From the thirty-two flags of CapabilitiesNew, in reply order.
    pub fn from_new(flags: [bool; 32]) -> Self {
        let mut caps = Self::from_basic([
            flags[0], flags[1], flags[2], flags[3], flags[4], flags[5], flags[6],
        ]);
        caps.can_redefine_classes = flags[7];
        caps.can_add_method = flags[8];
        caps.can_unrestrictedly_redefine_classes = flags[9];
        caps.can_pop_frames = flags[10];
        caps.can_use_instance_filters = flags[11];
        caps.can_get_source_debug_extension = flags[12];
        caps.can_request_vm_death_event = flags[13];
        caps.can_set_default_stratum = flags[14];
        caps.can_get_instance_info = flags[15];
        caps.can_request_monitor_events = flags[16];
        caps.can_get_monitor_frame_info = flags[17];
        caps.can_use_source_name_filters = flags[18];
        caps.can_get_constant_pool = flags[19];
        caps.can_force_early_return = flags[20];
        caps.reserved.copy_from_slice(&flags[21..32]);
        caps
    }
}

/// A code position: class, method, and bytecode index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub type_tag: u8,
    pub class_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64,
}

/// threadStatus values in ThreadReference.Status replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ThreadStatus {
    Zombie = 0,
    Running = 1,
    Sleeping = 2,
    Monitor = 3,
    Wait = 4,
}

impl ThreadStatus {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Zombie),
            1 => Some(Self::Running),
            2 => Some(Self::Sleeping),
            3 => Some(Self::Monitor),
            4 => Some(Self::Wait),
            _ => None,
        }
    }
}

/// suspendStatus in ThreadReference.Status replies is a bit set; only bit 0
/// (SUSPEND_STATUS_SUSPENDED) is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspendStatus {
    Running,
    Suspended,
}

impl SuspendStatus {
    pub fn from_i32(value: i32) -> Self {
        if value & 1 != 0 {
            Self::Suspended
        } else {
            Self::Running
        }
    }

    pub fn is_suspended(self) -> bool {
        matches!(self, Self::Suspended)
    }
}

/// Suspend policy attached to event requests and echoed in event sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SuspendPolicy {
    None = 0,
    EventThread = 1,
    All = 2,
}

impl SuspendPolicy {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::EventThread),
            2 => Some(Self::All),
            _ => None,
        }
    }
}
