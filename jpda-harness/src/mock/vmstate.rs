// In-memory state of the mock debuggee VM
//
// Everything the wire handlers need to answer commands: threads with nested
// suspend counts, a fixed class list, string objects with debugger-side
// reference counts, and registered event requests. Pure state; the socket
// handling lives in the server module.

use jdwp_mirror::commands::{class_status, error_codes, event_kinds, ref_type_tags};
use jdwp_mirror::types::{
    ObjectId, ReferenceTypeId, StringId, SuspendPolicy, ThreadGroupId, ThreadId, ThreadStatus,
};
use std::collections::{HashMap, VecDeque};

pub const MAIN_THREAD_ID: ThreadId = 0x1000;
pub const WORKER_THREAD_BASE: ThreadId = 0x1100;
pub const MAIN_GROUP_ID: ThreadGroupId = 0x500;

pub const OBJECT_CLASS_ID: ReferenceTypeId = 0x0100;
pub const STRING_CLASS_ID: ReferenceTypeId = 0x0101;
pub const THREAD_CLASS_ID: ReferenceTypeId = 0x0102;
pub const RUNNABLE_INTERFACE_ID: ReferenceTypeId = 0x0103;
pub const ARRAY_LIST_CLASS_ID: ReferenceTypeId = 0x0104;
pub const OBJECT_ARRAY_CLASS_ID: ReferenceTypeId = 0x0105;
pub const DEBUGGEE_CLASS_ID: ReferenceTypeId = 0x0106;

const FIRST_OBJECT_ID: ObjectId = 0x9000;

pub const VM_NAME: &str = "MockVM";
pub const VM_VERSION: &str = "1.0-mock";
pub const BASE_DIR: &str = "/opt/mockvm";

#[derive(Debug)]
pub struct MockThread {
    pub id: ThreadId,
    pub name: String,
    pub suspend_count: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MockClass {
    pub tag: u8,
    pub id: ReferenceTypeId,
    pub signature: &'static str,
    pub generic: Option<&'static str>,
    pub status: i32,
}

#[derive(Debug)]
pub struct MockObject {
    pub type_id: ReferenceTypeId,
    pub value: String,
    pub ref_count: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct EventRequest {
    pub id: i32,
    pub kind: u8,
    pub policy: SuspendPolicy,
}

pub struct VmState {
    threads: Vec<MockThread>,
    classes: Vec<MockClass>,
    objects: HashMap<ObjectId, MockObject>,
    next_object_id: ObjectId,
    requests: Vec<EventRequest>,
    next_request_id: i32,
    events_held: bool,
    held: VecDeque<Vec<u8>>,
}

impl VmState {
    pub fn new(worker_count: u32) -> Self {
        let prepared = class_status::VERIFIED | class_status::PREPARED | class_status::INITIALIZED;
        let classes = vec![
            MockClass {
                tag: ref_type_tags::CLASS,
                id: OBJECT_CLASS_ID,
                signature: "Ljava/lang/Object;",
                generic: None,
                status: prepared,
            },
            MockClass {
                tag: ref_type_tags::CLASS,
                id: STRING_CLASS_ID,
                signature: "Ljava/lang/String;",
                generic: None,
                status: prepared,
            },
            MockClass {
                tag: ref_type_tags::CLASS,
                id: THREAD_CLASS_ID,
                signature: "Ljava/lang/Thread;",
                generic: None,
                status: prepared,
            },
            MockClass {
                tag: ref_type_tags::INTERFACE,
                id: RUNNABLE_INTERFACE_ID,
                signature: "Ljava/lang/Runnable;",
                generic: None,
                status: prepared,
            },
            MockClass {
                tag: ref_type_tags::CLASS,
                id: ARRAY_LIST_CLASS_ID,
                signature: "Ljava/util/ArrayList;",
                generic: Some("Ljava/util/ArrayList<TE;>;"),
                status: prepared,
            },
            MockClass {
                tag: ref_type_tags::ARRAY,
                id: OBJECT_ARRAY_CLASS_ID,
                signature: "[Ljava/lang/Object;",
                generic: None,
                status: prepared,
            },
            MockClass {
                tag: ref_type_tags::CLASS,
                id: DEBUGGEE_CLASS_ID,
                signature: "Lorg/harness/MockDebuggee;",
                generic: None,
                status: prepared,
            },
        ];

        let mut threads = vec![MockThread {
            id: MAIN_THREAD_ID,
            name: "main".to_string(),
            suspend_count: 0,
            alive: true,
        }];
        for n in 0..worker_count {
            threads.push(MockThread {
                id: WORKER_THREAD_BASE + ThreadId::from(n),
                name: format!("worker-{n}"),
                suspend_count: 0,
                alive: false,
            });
        }

        Self {
            threads,
            classes,
            objects: HashMap::new(),
            next_object_id: FIRST_OBJECT_ID,
            requests: Vec::new(),
            next_request_id: 1,
            events_held: false,
            held: VecDeque::new(),
        }
    }

    // -- threads --

    fn thread(&self, id: ThreadId) -> Option<&MockThread> {
        self.threads.iter().find(|t| t.id == id && t.alive)
    }

    fn thread_mut(&mut self, id: ThreadId) -> Option<&mut MockThread> {
        self.threads.iter_mut().find(|t| t.id == id && t.alive)
    }

    pub fn alive_threads(&self) -> Vec<ThreadId> {
        self.threads
            .iter()
            .filter(|t| t.alive)
            .map(|t| t.id)
            .collect()
    }

    pub fn thread_name(&self, id: ThreadId) -> Result<String, u16> {
        self.thread(id)
            .map(|t| t.name.clone())
            .ok_or(error_codes::INVALID_THREAD)
    }

    pub fn suspend_thread(&mut self, id: ThreadId) -> Result<(), u16> {
        let thread = self.thread_mut(id).ok_or(error_codes::INVALID_THREAD)?;
        thread.suspend_count += 1;
        Ok(())
    }

    /// Resuming a running thread is a no-op, as in a real VM.
    pub fn resume_thread(&mut self, id: ThreadId) -> Result<(), u16> {
        let thread = self.thread_mut(id).ok_or(error_codes::INVALID_THREAD)?;
        thread.suspend_count = thread.suspend_count.saturating_sub(1);
        Ok(())
    }

    pub fn suspend_all(&mut self) {
        for thread in self.threads.iter_mut().filter(|t| t.alive) {
            thread.suspend_count += 1;
        }
    }

    pub fn resume_all(&mut self) {
        for thread in self.threads.iter_mut().filter(|t| t.alive) {
            thread.suspend_count = thread.suspend_count.saturating_sub(1);
        }
    }

    /// (threadStatus, suspendStatus) pair for ThreadReference.Status.
    pub fn thread_status(&self, id: ThreadId) -> Result<(i32, i32), u16> {
        let thread = self.thread(id).ok_or(error_codes::INVALID_THREAD)?;
        let suspend_bit = if thread.suspend_count > 0 { 1 } else { 0 };
        Ok((ThreadStatus::Running as i32, suspend_bit))
    }

    pub fn suspend_count(&self, id: ThreadId) -> Result<i32, u16> {
        let thread = self.thread(id).ok_or(error_codes::INVALID_THREAD)?;
        Ok(thread.suspend_count as i32)
    }

    /// Bring the worker threads to life. Returns their ids in start order.
    pub fn start_workers(&mut self) -> Vec<ThreadId> {
        let mut started = Vec::new();
        for thread in self.threads.iter_mut().filter(|t| t.id != MAIN_THREAD_ID) {
            if !thread.alive {
                thread.alive = true;
                started.push(thread.id);
            }
        }
        started
    }

    /// Let every worker die. Dead threads answer INVALID_THREAD from then on.
    pub fn kill_workers(&mut self) -> Vec<ThreadId> {
        let mut died = Vec::new();
        for thread in self.threads.iter_mut().filter(|t| t.id != MAIN_THREAD_ID) {
            if thread.alive {
                thread.alive = false;
                thread.suspend_count = 0;
                died.push(thread.id);
            }
        }
        died
    }

    pub fn apply_event_policy(&mut self, policy: SuspendPolicy, thread: Option<ThreadId>) {
        match policy {
            SuspendPolicy::None => {}
            SuspendPolicy::EventThread => {
                if let Some(id) = thread {
                    let _ = self.suspend_thread(id);
                }
            }
            SuspendPolicy::All => self.suspend_all(),
        }
    }

    // -- classes --

    pub fn classes(&self) -> &[MockClass] {
        &self.classes
    }

    pub fn classes_by_signature(&self, signature: &str) -> Vec<MockClass> {
        self.classes
            .iter()
            .filter(|c| c.signature == signature)
            .copied()
            .collect()
    }

    // -- objects --

    pub fn create_string(&mut self, value: &str) -> StringId {
        let id = self.next_object_id;
        self.next_object_id += 1;
        self.objects.insert(
            id,
            MockObject {
                type_id: STRING_CLASS_ID,
                value: value.to_string(),
                ref_count: 1,
            },
        );
        id
    }

    pub fn string_value(&self, id: StringId) -> Result<String, u16> {
        self.objects
            .get(&id)
            .map(|o| o.value.clone())
            .ok_or(error_codes::INVALID_OBJECT)
    }

    pub fn object_type(&self, id: ObjectId) -> Result<(u8, ReferenceTypeId), u16> {
        self.objects
            .get(&id)
            .map(|o| (ref_type_tags::CLASS, o.type_id))
            .ok_or(error_codes::INVALID_OBJECT)
    }

    /// Drop `count` debugger references; the object dies when none remain.
    /// Ids the VM no longer knows are ignored, per the protocol.
    pub fn dispose_object(&mut self, id: ObjectId, count: i32) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.ref_count -= count;
            if object.ref_count <= 0 {
                self.objects.remove(&id);
            }
        }
    }

    pub fn instance_count(&self, type_id: ReferenceTypeId) -> i64 {
        self.objects.values().filter(|o| o.type_id == type_id).count() as i64
    }

    // -- event requests --

    pub fn add_request(&mut self, kind: u8, policy: SuspendPolicy) -> i32 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.requests.push(EventRequest { id, kind, policy });
        id
    }

    pub fn clear_request(&mut self, kind: u8, request_id: i32) -> Result<(), u16> {
        let before = self.requests.len();
        self.requests
            .retain(|r| !(r.kind == kind && r.id == request_id));
        if self.requests.len() == before {
            return Err(error_codes::NOT_FOUND);
        }
        Ok(())
    }

    pub fn clear_all_breakpoints(&mut self) {
        self.requests.retain(|r| r.kind != event_kinds::BREAKPOINT);
    }

    /// Requests matching an event kind, in registration order.
    pub fn requests_for(&self, kind: u8) -> Vec<EventRequest> {
        self.requests
            .iter()
            .filter(|r| r.kind == kind)
            .copied()
            .collect()
    }

    // -- event gating --

    pub fn hold_events(&mut self) {
        self.events_held = true;
    }

    /// Stop holding; hands back everything queued, oldest first.
    pub fn release_events(&mut self) -> Vec<Vec<u8>> {
        self.events_held = false;
        self.held.drain(..).collect()
    }

    /// Route an encoded event packet through the hold gate. Returns the
    /// packet when it should go out now, or queues it.
    pub fn gate_event(&mut self, packet: Vec<u8>) -> Option<Vec<u8>> {
        if self.events_held {
            self.held.push_back(packet);
            None
        } else {
            Some(packet)
        }
    }
}
