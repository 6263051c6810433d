// Debugger-side view of per-thread suspend counts
//
// Mirrors the VM's suspension rules: suspensions nest, a thread runs again
// only when its count returns to zero, and resuming a running thread is a
// no-op. The tracker is plain data; callers share it behind a lock.

use crate::types::{SuspendPolicy, ThreadId};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct SuspendTracker {
    counts: HashMap<ThreadId, u32>,
}

impl SuspendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a thread at count zero, typically on THREAD_START.
    pub fn register_thread(&mut self, thread: ThreadId) {
        self.counts.entry(thread).or_insert(0);
    }

    /// Stop tracking a thread, typically on THREAD_DEATH.
    pub fn forget_thread(&mut self, thread: ThreadId) {
        self.counts.remove(&thread);
    }

    pub fn suspend_thread(&mut self, thread: ThreadId) {
        *self.counts.entry(thread).or_insert(0) += 1;
    }

    /// Resuming below zero is silently ignored, matching the VM.
    pub fn resume_thread(&mut self, thread: ThreadId) {
        if let Some(count) = self.counts.get_mut(&thread) {
            *count = count.saturating_sub(1);
        }
    }

    /// VirtualMachine.Suspend: every known thread gains one suspension.
    pub fn suspend_all(&mut self) {
        for count in self.counts.values_mut() {
            *count += 1;
        }
    }

    /// VirtualMachine.Resume: every known thread sheds one suspension.
    pub fn resume_all(&mut self) {
        for count in self.counts.values_mut() {
            *count = count.saturating_sub(1);
        }
    }

    /// Record the effect of a composite event's suspend policy.
    pub fn apply_suspend_policy(&mut self, policy: SuspendPolicy, event_thread: Option<ThreadId>) {
        match policy {
            SuspendPolicy::None => {}
            SuspendPolicy::EventThread => {
                if let Some(thread) = event_thread {
                    self.suspend_thread(thread);
                }
            }
            SuspendPolicy::All => self.suspend_all(),
        }
    }

    pub fn suspend_count(&self, thread: ThreadId) -> u32 {
        self.counts.get(&thread).copied().unwrap_or(0)
    }

    pub fn is_suspended(&self, thread: ThreadId) -> bool {
        self.suspend_count(thread) > 0
    }

    pub fn known_threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<ThreadId> = self.counts.keys().copied().collect();
        threads.sort_unstable();
        threads
    }

    pub fn suspended_threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<ThreadId> = self
            .counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(thread, _)| *thread)
            .collect();
        threads.sort_unstable();
        threads
    }

    /// Drop all state, e.g. after Dispose severs the session.
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspensions_nest() {
        let mut tracker = SuspendTracker::new();
        tracker.suspend_thread(7);
        tracker.suspend_thread(7);
        assert_eq!(tracker.suspend_count(7), 2);

        tracker.resume_thread(7);
        assert!(tracker.is_suspended(7));

        tracker.resume_thread(7);
        assert!(!tracker.is_suspended(7));
    }

    #[test]
    fn test_resume_of_running_thread_is_ignored() {
        let mut tracker = SuspendTracker::new();
        tracker.register_thread(3);
        tracker.resume_thread(3);
        tracker.resume_thread(3);
        assert_eq!(tracker.suspend_count(3), 0);

        // Unknown threads stay unknown.
        tracker.resume_thread(99);
        assert_eq!(tracker.known_threads(), vec![3]);
    }

    #[test]
    fn test_vm_wide_suspend_and_resume() {
        let mut tracker = SuspendTracker::new();
        for thread in 1..=4 {
            tracker.register_thread(thread);
        }
        tracker.suspend_thread(2);

        tracker.suspend_all();
        assert_eq!(tracker.suspended_threads(), vec![1, 2, 3, 4]);
        assert_eq!(tracker.suspend_count(2), 2);

        tracker.resume_all();
        assert_eq!(tracker.suspended_threads(), vec![2]);
    }

    #[test]
    fn test_suspend_policies() {
        let mut tracker = SuspendTracker::new();
        tracker.register_thread(1);
        tracker.register_thread(2);

        tracker.apply_suspend_policy(SuspendPolicy::None, Some(1));
        assert_eq!(tracker.suspended_threads(), Vec::<ThreadId>::new());

        tracker.apply_suspend_policy(SuspendPolicy::EventThread, Some(1));
        assert_eq!(tracker.suspended_threads(), vec![1]);

        tracker.apply_suspend_policy(SuspendPolicy::All, None);
        assert_eq!(tracker.suspend_count(1), 2);
        assert_eq!(tracker.suspend_count(2), 1);
    }

    #[test]
    fn test_event_thread_policy_registers_unknown_thread() {
        let mut tracker = SuspendTracker::new();
        tracker.apply_suspend_policy(SuspendPolicy::EventThread, Some(42));
        assert_eq!(tracker.suspend_count(42), 1);
    }

    #[test]
    fn test_forget_and_clear() {
        let mut tracker = SuspendTracker::new();
        tracker.suspend_thread(1);
        tracker.suspend_thread(2);

        tracker.forget_thread(1);
        assert_eq!(tracker.known_threads(), vec![2]);

        tracker.clear();
        assert!(tracker.known_threads().is_empty());
    }
}
