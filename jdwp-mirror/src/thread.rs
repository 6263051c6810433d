// ThreadReference command set
//
// Per-thread naming, status, and nested suspension.

use crate::commands::{command_sets, thread_commands};
use crate::mirror::VmMirror;
use crate::protocol::{JdwpError, JdwpResult};
use crate::types::{SuspendStatus, ThreadId, ThreadStatus};

impl VmMirror {
    /// Get a thread's name (ThreadReference.Name)
    pub async fn thread_name(&self, thread: ThreadId) -> JdwpResult<String> {
        let mut data = Vec::new();
        self.writer(&mut data).put_thread_id(thread);

        let reply = self
            .command(command_sets::THREAD_REFERENCE, thread_commands::NAME, data)
            .await?;

        let mut cursor = self.cursor(&reply);
        let name = cursor.next_string()?;
        cursor.expect_end()?;
        Ok(name)
    }

    /// Suspend one thread (ThreadReference.Suspend). Suspensions nest; the
    /// tracker mirrors the count.
    pub async fn suspend_thread(&self, thread: ThreadId) -> JdwpResult<()> {
        let mut data = Vec::new();
        self.writer(&mut data).put_thread_id(thread);

        self.command(command_sets::THREAD_REFERENCE, thread_commands::SUSPEND, data)
            .await?;

        self.suspend_handle().lock().await.suspend_thread(thread);
        Ok(())
    }

    /// Undo one suspension of a thread (ThreadReference.Resume)
    pub async fn resume_thread(&self, thread: ThreadId) -> JdwpResult<()> {
        let mut data = Vec::new();
        self.writer(&mut data).put_thread_id(thread);

        self.command(command_sets::THREAD_REFERENCE, thread_commands::RESUME, data)
            .await?;

        self.suspend_handle().lock().await.resume_thread(thread);
        Ok(())
    }

    /// Thread and suspension status (ThreadReference.Status)
    pub async fn thread_status(
        &self,
        thread: ThreadId,
    ) -> JdwpResult<(ThreadStatus, SuspendStatus)> {
        let mut data = Vec::new();
        self.writer(&mut data).put_thread_id(thread);

        let reply = self
            .command(command_sets::THREAD_REFERENCE, thread_commands::STATUS, data)
            .await?;

        let mut cursor = self.cursor(&reply);
        let raw_status = cursor.next_i32()?;
        let thread_status = ThreadStatus::from_i32(raw_status).ok_or_else(|| {
            JdwpError::Framing(format!("unknown thread status {raw_status}"))
        })?;
        let suspend_status = SuspendStatus::from_i32(cursor.next_i32()?);
        cursor.expect_end()?;

        Ok((thread_status, suspend_status))
    }

    /// How many suspensions a thread has pending, as the VM counts them
    /// (ThreadReference.SuspendCount)
    pub async fn thread_suspend_count(&self, thread: ThreadId) -> JdwpResult<i32> {
        let mut data = Vec::new();
        self.writer(&mut data).put_thread_id(thread);

        let reply = self
            .command(
                command_sets::THREAD_REFERENCE,
                thread_commands::SUSPEND_COUNT,
                data,
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let count = cursor.next_i32()?;
        cursor.expect_end()?;
        Ok(count)
    }
}
