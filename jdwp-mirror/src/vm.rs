// VirtualMachine command set
//
// Session-wide commands: introspection, VM-wide suspension, string and
// object lifetime management, event flow control, and shutdown.

use crate::commands::{command_sets, error_codes, vm_commands};
use crate::mirror::{ReplyOutcome, VmMirror};
use crate::protocol::JdwpResult;
use crate::types::{ObjectId, ReferenceTypeId, StringId, ThreadGroupId, ThreadId};
use serde::{Deserialize, Serialize};
use tracing::info;

/// VM version information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

/// One loaded reference type, as reported by the class list commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub ref_type_tag: u8, // 1=class, 2=interface, 3=array
    pub type_id: ReferenceTypeId,
    pub signature: String,
    /// Only populated by AllClassesWithGeneric, and only for generic types.
    pub generic_signature: Option<String>,
    pub status: i32,
}

/// Classpath configuration of the debuggee (VirtualMachine.ClassPaths)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassPaths {
    pub base_dir: String,
    pub classpaths: Vec<String>,
    pub boot_classpaths: Vec<String>,
}

impl VmMirror {
    /// Get VM version information (VirtualMachine.Version)
    pub async fn version(&self) -> JdwpResult<VmVersion> {
        let reply = self
            .command(command_sets::VIRTUAL_MACHINE, vm_commands::VERSION, Vec::new())
            .await?;

        let mut cursor = self.cursor(&reply);
        let version = VmVersion {
            description: cursor.next_string()?,
            jdwp_major: cursor.next_i32()?,
            jdwp_minor: cursor.next_i32()?,
            vm_version: cursor.next_string()?,
            vm_name: cursor.next_string()?,
        };
        cursor.expect_end()?;
        Ok(version)
    }

    /// Find loaded classes matching a JNI signature
    /// (VirtualMachine.ClassesBySignature)
    pub async fn classes_by_signature(&self, signature: &str) -> JdwpResult<Vec<ClassInfo>> {
        let mut data = Vec::new();
        self.writer(&mut data).put_string(signature);

        let reply = self
            .command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::CLASSES_BY_SIGNATURE,
                data,
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let count = cursor.next_i32()?;
        let mut classes = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            classes.push(ClassInfo {
                ref_type_tag: cursor.next_u8()?,
                type_id: cursor.next_reference_type_id()?,
                signature: signature.to_string(),
                generic_signature: None,
                status: cursor.next_i32()?,
            });
        }
        cursor.expect_end()?;
        Ok(classes)
    }

    /// Every reference type the VM has loaded (VirtualMachine.AllClasses)
    pub async fn all_classes(&self) -> JdwpResult<Vec<ClassInfo>> {
        let reply = self
            .command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::ALL_CLASSES,
                Vec::new(),
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let count = cursor.next_i32()?;
        let mut classes = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            classes.push(ClassInfo {
                ref_type_tag: cursor.next_u8()?,
                type_id: cursor.next_reference_type_id()?,
                signature: cursor.next_string()?,
                generic_signature: None,
                status: cursor.next_i32()?,
            });
        }
        cursor.expect_end()?;
        Ok(classes)
    }

    /// AllClasses plus the generic signature where a type has one
    /// (VirtualMachine.AllClassesWithGeneric)
    pub async fn all_classes_with_generic(&self) -> JdwpResult<Vec<ClassInfo>> {
        let reply = self
            .command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::ALL_CLASSES_WITH_GENERIC,
                Vec::new(),
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let count = cursor.next_i32()?;
        let mut classes = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let ref_type_tag = cursor.next_u8()?;
            let type_id = cursor.next_reference_type_id()?;
            let signature = cursor.next_string()?;
            let generic = cursor.next_string()?;
            classes.push(ClassInfo {
                ref_type_tag,
                type_id,
                signature,
                // The wire encodes "no generic signature" as an empty string.
                generic_signature: if generic.is_empty() {
                    None
                } else {
                    Some(generic)
                },
                status: cursor.next_i32()?,
            });
        }
        cursor.expect_end()?;
        Ok(classes)
    }

    /// All live threads (VirtualMachine.AllThreads). The returned threads
    /// are registered with the suspend tracker.
    pub async fn all_threads(&self) -> JdwpResult<Vec<ThreadId>> {
        let reply = self
            .command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::ALL_THREADS,
                Vec::new(),
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let count = cursor.next_i32()?;
        let mut threads = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            threads.push(cursor.next_thread_id()?);
        }
        cursor.expect_end()?;

        let mut tracker = self.suspend_handle().lock().await;
        for thread in &threads {
            tracker.register_thread(*thread);
        }

        Ok(threads)
    }

    /// Top-level thread groups (VirtualMachine.TopLevelThreadGroups)
    pub async fn top_level_thread_groups(&self) -> JdwpResult<Vec<ThreadGroupId>> {
        let reply = self
            .command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::TOP_LEVEL_THREAD_GROUPS,
                Vec::new(),
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let count = cursor.next_i32()?;
        let mut groups = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            groups.push(cursor.next_thread_group_id()?);
        }
        cursor.expect_end()?;
        Ok(groups)
    }

    /// End the debugging session (VirtualMachine.Dispose). The VM resumes
    /// fully and our suspend bookkeeping is wiped.
    pub async fn dispose(&self) -> JdwpResult<()> {
        self.command(command_sets::VIRTUAL_MACHINE, vm_commands::DISPOSE, Vec::new())
            .await?;

        self.suspend_handle().lock().await.clear();
        info!("Session disposed");
        Ok(())
    }

    /// Suspend every thread in the VM (VirtualMachine.Suspend)
    pub async fn suspend(&self) -> JdwpResult<()> {
        self.command(command_sets::VIRTUAL_MACHINE, vm_commands::SUSPEND, Vec::new())
            .await?;

        self.suspend_handle().lock().await.suspend_all();
        Ok(())
    }

    /// Undo one VM-wide suspension (VirtualMachine.Resume)
    pub async fn resume(&self) -> JdwpResult<()> {
        self.command(command_sets::VIRTUAL_MACHINE, vm_commands::RESUME, Vec::new())
            .await?;

        self.suspend_handle().lock().await.resume_all();
        Ok(())
    }

    /// Terminate the debuggee with the given exit code (VirtualMachine.Exit)
    pub async fn exit(&self, exit_code: i32) -> JdwpResult<()> {
        let mut data = Vec::new();
        self.writer(&mut data).put_i32(exit_code);

        self.command(command_sets::VIRTUAL_MACHINE, vm_commands::EXIT, data)
            .await?;
        info!("Requested VM exit with code {}", exit_code);
        Ok(())
    }

    /// Intern a new string in the debuggee (VirtualMachine.CreateString)
    pub async fn create_string(&self, value: &str) -> JdwpResult<StringId> {
        let mut data = Vec::new();
        self.writer(&mut data).put_string(value);

        let reply = self
            .command(command_sets::VIRTUAL_MACHINE, vm_commands::CREATE_STRING, data)
            .await?;

        let mut cursor = self.cursor(&reply);
        let id = cursor.next_string_id()?;
        cursor.expect_end()?;
        Ok(id)
    }

    /// Classpath configuration of the debuggee (VirtualMachine.ClassPaths)
    pub async fn class_paths(&self) -> JdwpResult<ClassPaths> {
        let reply = self
            .command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::CLASS_PATHS,
                Vec::new(),
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let base_dir = cursor.next_string()?;

        let count = cursor.next_i32()?;
        let mut classpaths = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            classpaths.push(cursor.next_string()?);
        }

        let count = cursor.next_i32()?;
        let mut boot_classpaths = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            boot_classpaths.push(cursor.next_string()?);
        }
        cursor.expect_end()?;

        Ok(ClassPaths {
            base_dir,
            classpaths,
            boot_classpaths,
        })
    }

    /// Release debugger references to objects (VirtualMachine.DisposeObjects).
    /// Each entry pairs an object with the number of references to drop.
    pub async fn dispose_objects(&self, requests: &[(ObjectId, i32)]) -> JdwpResult<()> {
        let mut data = Vec::new();
        let mut w = self.writer(&mut data);
        w.put_i32(requests.len() as i32);
        for (object, ref_count) in requests {
            w.put_object_id(*object).put_i32(*ref_count);
        }

        self.command(
            command_sets::VIRTUAL_MACHINE,
            vm_commands::DISPOSE_OBJECTS,
            data,
        )
        .await?;
        Ok(())
    }

    /// Stop event delivery; the VM queues events until released
    /// (VirtualMachine.HoldEvents)
    pub async fn hold_events(&self) -> JdwpResult<()> {
        self.command(
            command_sets::VIRTUAL_MACHINE,
            vm_commands::HOLD_EVENTS,
            Vec::new(),
        )
        .await?;
        info!("Event delivery held");
        Ok(())
    }

    /// Resume event delivery, flushing anything held
    /// (VirtualMachine.ReleaseEvents)
    pub async fn release_events(&self) -> JdwpResult<()> {
        self.command(
            command_sets::VIRTUAL_MACHINE,
            vm_commands::RELEASE_EVENTS,
            Vec::new(),
        )
        .await?;
        info!("Event delivery released");
        Ok(())
    }

    /// Replace class definitions in place (VirtualMachine.RedefineClasses).
    /// VMs without the canRedefineClasses capability answer NOT_IMPLEMENTED,
    /// which is reported as an expected outcome rather than a failure.
    pub async fn redefine_classes(
        &self,
        classes: &[(ReferenceTypeId, Vec<u8>)],
    ) -> JdwpResult<ReplyOutcome> {
        let mut data = Vec::new();
        let mut w = self.writer(&mut data);
        w.put_i32(classes.len() as i32);
        for (type_id, class_bytes) in classes {
            w.put_reference_type_id(*type_id)
                .put_i32(class_bytes.len() as i32)
                .put_bytes(class_bytes);
        }

        self.command_tolerating(
            command_sets::VIRTUAL_MACHINE,
            vm_commands::REDEFINE_CLASSES,
            data,
            &[error_codes::NOT_IMPLEMENTED],
        )
        .await
    }

    /// Set the default stratum for line number mapping
    /// (VirtualMachine.SetDefaultStratum). Optional capability, tolerated
    /// the same way as RedefineClasses.
    pub async fn set_default_stratum(&self, stratum: &str) -> JdwpResult<ReplyOutcome> {
        let mut data = Vec::new();
        self.writer(&mut data).put_string(stratum);

        self.command_tolerating(
            command_sets::VIRTUAL_MACHINE,
            vm_commands::SET_DEFAULT_STRATUM,
            data,
            &[error_codes::NOT_IMPLEMENTED],
        )
        .await
    }

    /// Instance counts for the given reference types
    /// (VirtualMachine.InstanceCounts). `None` when the VM lacks the
    /// canGetInstanceInfo capability.
    pub async fn instance_counts(
        &self,
        types: &[ReferenceTypeId],
    ) -> JdwpResult<Option<Vec<i64>>> {
        let mut data = Vec::new();
        let mut w = self.writer(&mut data);
        w.put_i32(types.len() as i32);
        for type_id in types {
            w.put_reference_type_id(*type_id);
        }

        let outcome = self
            .command_tolerating(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::INSTANCE_COUNTS,
                data,
                &[error_codes::NOT_IMPLEMENTED],
            )
            .await?;

        let Some(reply) = outcome.into_reply() else {
            return Ok(None);
        };

        let mut cursor = self.cursor(&reply);
        let count = cursor.next_i32()?;
        let mut counts = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            counts.push(cursor.next_i64()?);
        }
        cursor.expect_end()?;
        Ok(Some(counts))
    }
}
