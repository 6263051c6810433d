// JDWP command numbering
//
// Command Sets:
// 1  = VirtualMachine
// 9  = ObjectReference
// 10 = StringReference
// 11 = ThreadReference
// 15 = EventRequest
// 64 = Event (debuggee -> debugger composite packets)

pub mod command_sets {
    pub const VIRTUAL_MACHINE: u8 = 1;
    pub const REFERENCE_TYPE: u8 = 2;
    pub const OBJECT_REFERENCE: u8 = 9;
    pub const STRING_REFERENCE: u8 = 10;
    pub const THREAD_REFERENCE: u8 = 11;
    pub const THREAD_GROUP_REFERENCE: u8 = 12;
    pub const EVENT_REQUEST: u8 = 15;
    pub const EVENT: u8 = 64;
}

// VirtualMachine commands (set 1)
pub mod vm_commands {
    pub const VERSION: u8 = 1;
    pub const CLASSES_BY_SIGNATURE: u8 = 2;
    pub const ALL_CLASSES: u8 = 3;
    pub const ALL_THREADS: u8 = 4;
    pub const TOP_LEVEL_THREAD_GROUPS: u8 = 5;
    pub const DISPOSE: u8 = 6;
    pub const ID_SIZES: u8 = 7;
    pub const SUSPEND: u8 = 8;
    pub const RESUME: u8 = 9;
    pub const EXIT: u8 = 10;
    pub const CREATE_STRING: u8 = 11;
    pub const CAPABILITIES: u8 = 12;
    pub const CLASS_PATHS: u8 = 13;
    pub const DISPOSE_OBJECTS: u8 = 14;
    pub const HOLD_EVENTS: u8 = 15;
    pub const RELEASE_EVENTS: u8 = 16;
    pub const CAPABILITIES_NEW: u8 = 17;
    pub const REDEFINE_CLASSES: u8 = 18;
    pub const SET_DEFAULT_STRATUM: u8 = 19;
    pub const ALL_CLASSES_WITH_GENERIC: u8 = 20;
    pub const INSTANCE_COUNTS: u8 = 21;
}

// ObjectReference commands (set 9)
pub mod object_reference_commands {
    pub const REFERENCE_TYPE: u8 = 1;
}

// StringReference commands (set 10)
pub mod string_reference_commands {
    pub const VALUE: u8 = 1;
}

// ThreadReference commands (set 11)
pub mod thread_commands {
    pub const NAME: u8 = 1;
    pub const SUSPEND: u8 = 2;
    pub const RESUME: u8 = 3;
    pub const STATUS: u8 = 4;
    pub const SUSPEND_COUNT: u8 = 12;
}

// EventRequest commands (set 15)
pub mod event_request_commands {
    pub const SET: u8 = 1;
    pub const CLEAR: u8 = 2;
    pub const CLEAR_ALL_BREAKPOINTS: u8 = 3;
}

// Event commands (set 64)
pub mod event_commands {
    pub const COMPOSITE: u8 = 100;
}

// Event kinds carried inside composite events and in EventRequest.Set
pub mod event_kinds {
    pub const SINGLE_STEP: u8 = 1;
    pub const BREAKPOINT: u8 = 2;
    pub const FRAME_POP: u8 = 3;
    pub const EXCEPTION: u8 = 4;
    pub const USER_DEFINED: u8 = 5;
    pub const THREAD_START: u8 = 6;
    pub const THREAD_DEATH: u8 = 7;
    pub const CLASS_PREPARE: u8 = 8;
    pub const CLASS_UNLOAD: u8 = 9;
    pub const CLASS_LOAD: u8 = 10;
    pub const FIELD_ACCESS: u8 = 20;
    pub const FIELD_MODIFICATION: u8 = 21;
    pub const EXCEPTION_CATCH: u8 = 30;
    pub const METHOD_ENTRY: u8 = 40;
    pub const METHOD_EXIT: u8 = 41;
    pub const VM_START: u8 = 90;
    pub const VM_DEATH: u8 = 99;

    pub fn name(kind: u8) -> &'static str {
        match kind {
            SINGLE_STEP => "SINGLE_STEP",
            BREAKPOINT => "BREAKPOINT",
            FRAME_POP => "FRAME_POP",
            EXCEPTION => "EXCEPTION",
            USER_DEFINED => "USER_DEFINED",
            THREAD_START => "THREAD_START",
            THREAD_DEATH => "THREAD_DEATH",
            CLASS_PREPARE => "CLASS_PREPARE",
            CLASS_UNLOAD => "CLASS_UNLOAD",
            CLASS_LOAD => "CLASS_LOAD",
            FIELD_ACCESS => "FIELD_ACCESS",
            FIELD_MODIFICATION => "FIELD_MODIFICATION",
            EXCEPTION_CATCH => "EXCEPTION_CATCH",
            METHOD_ENTRY => "METHOD_ENTRY",
            METHOD_EXIT => "METHOD_EXIT",
            VM_START => "VM_START",
            VM_DEATH => "VM_DEATH",
            _ => "UNKNOWN",
        }
    }
}

// Reply error codes the core issues or tolerates by name
pub mod error_codes {
    pub const NONE: u16 = 0;
    pub const INVALID_THREAD: u16 = 10;
    pub const THREAD_NOT_SUSPENDED: u16 = 13;
    pub const INVALID_OBJECT: u16 = 20;
    pub const NOT_FOUND: u16 = 41;
    pub const INVALID_CLASS_FORMAT: u16 = 60;
    pub const UNSUPPORTED_VERSION: u16 = 68;
    pub const NOT_IMPLEMENTED: u16 = 99;
    pub const INVALID_EVENT_TYPE: u16 = 102;
    pub const ILLEGAL_ARGUMENT: u16 = 103;
    pub const VM_DEAD: u16 = 112;
    pub const INVALID_STRING: u16 = 506;
    pub const INVALID_COUNT: u16 = 512;
}

// refTypeTag values in AllClasses/ClassesBySignature replies
pub mod ref_type_tags {
    pub const CLASS: u8 = 1;
    pub const INTERFACE: u8 = 2;
    pub const ARRAY: u8 = 3;
}

// ClassStatus bits
pub mod class_status {
    pub const VERIFIED: i32 = 1;
    pub const PREPARED: i32 = 2;
    pub const INITIALIZED: i32 = 4;
    pub const ERROR: i32 = 8;
}

/// Human-readable "Set.Command" name for log lines and error context.
pub fn command_name(command_set: u8, command: u8) -> String {
    use command_sets::*;

    let known = match (command_set, command) {
        (VIRTUAL_MACHINE, vm_commands::VERSION) => "VirtualMachine.Version",
        (VIRTUAL_MACHINE, vm_commands::CLASSES_BY_SIGNATURE) => "VirtualMachine.ClassesBySignature",
        (VIRTUAL_MACHINE, vm_commands::ALL_CLASSES) => "VirtualMachine.AllClasses",
        (VIRTUAL_MACHINE, vm_commands::ALL_THREADS) => "VirtualMachine.AllThreads",
        (VIRTUAL_MACHINE, vm_commands::TOP_LEVEL_THREAD_GROUPS) => {
            "VirtualMachine.TopLevelThreadGroups"
        }
        (VIRTUAL_MACHINE, vm_commands::DISPOSE) => "VirtualMachine.Dispose",
        (VIRTUAL_MACHINE, vm_commands::ID_SIZES) => "VirtualMachine.IDSizes",
        (VIRTUAL_MACHINE, vm_commands::SUSPEND) => "VirtualMachine.Suspend",
        (VIRTUAL_MACHINE, vm_commands::RESUME) => "VirtualMachine.Resume",
        (VIRTUAL_MACHINE, vm_commands::EXIT) => "VirtualMachine.Exit",
        (VIRTUAL_MACHINE, vm_commands::CREATE_STRING) => "VirtualMachine.CreateString",
        (VIRTUAL_MACHINE, vm_commands::CAPABILITIES) => "VirtualMachine.Capabilities",
        (VIRTUAL_MACHINE, vm_commands::CLASS_PATHS) => "VirtualMachine.ClassPaths",
        (VIRTUAL_MACHINE, vm_commands::DISPOSE_OBJECTS) => "VirtualMachine.DisposeObjects",
        (VIRTUAL_MACHINE, vm_commands::HOLD_EVENTS) => "VirtualMachine.HoldEvents",
        (VIRTUAL_MACHINE, vm_commands::RELEASE_EVENTS) => "VirtualMachine.ReleaseEvents",
        (VIRTUAL_MACHINE, vm_commands::CAPABILITIES_NEW) => "VirtualMachine.CapabilitiesNew",
        (VIRTUAL_MACHINE, vm_commands::REDEFINE_CLASSES) => "VirtualMachine.RedefineClasses",
        (VIRTUAL_MACHINE, vm_commands::SET_DEFAULT_STRATUM) => "VirtualMachine.SetDefaultStratum",
        (VIRTUAL_MACHINE, vm_commands::ALL_CLASSES_WITH_GENERIC) => {
            "VirtualMachine.AllClassesWithGeneric"
        }
        (VIRTUAL_MACHINE, vm_commands::INSTANCE_COUNTS) => "VirtualMachine.InstanceCounts",
        (OBJECT_REFERENCE, object_reference_commands::REFERENCE_TYPE) => {
            "ObjectReference.ReferenceType"
        }
        (STRING_REFERENCE, string_reference_commands::VALUE) => "StringReference.Value",
        (THREAD_REFERENCE, thread_commands::NAME) => "ThreadReference.Name",
        (THREAD_REFERENCE, thread_commands::SUSPEND) => "ThreadReference.Suspend",
        (THREAD_REFERENCE, thread_commands::RESUME) => "ThreadReference.Resume",
        (THREAD_REFERENCE, thread_commands::STATUS) => "ThreadReference.Status",
        (THREAD_REFERENCE, thread_commands::SUSPEND_COUNT) => "ThreadReference.SuspendCount",
        (EVENT_REQUEST, event_request_commands::SET) => "EventRequest.Set",
        (EVENT_REQUEST, event_request_commands::CLEAR) => "EventRequest.Clear",
        (EVENT_REQUEST, event_request_commands::CLEAR_ALL_BREAKPOINTS) => {
            "EventRequest.ClearAllBreakpoints"
        }
        (EVENT, event_commands::COMPOSITE) => "Event.Composite",
        _ => "",
    };

    if known.is_empty() {
        format!("{command_set}.{command}")
    } else {
        known.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_have_names() {
        assert_eq!(
            command_name(command_sets::VIRTUAL_MACHINE, vm_commands::ID_SIZES),
            "VirtualMachine.IDSizes"
        );
        assert_eq!(
            command_name(command_sets::STRING_REFERENCE, string_reference_commands::VALUE),
            "StringReference.Value"
        );
    }

    #[test]
    fn unknown_commands_fall_back_to_numbers() {
        assert_eq!(command_name(200, 42), "200.42");
    }

    #[test]
    fn event_kind_names() {
        assert_eq!(event_kinds::name(event_kinds::THREAD_START), "THREAD_START");
        assert_eq!(event_kinds::name(250), "UNKNOWN");
    }
}
