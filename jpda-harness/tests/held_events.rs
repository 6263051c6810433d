//! Event delivery: requests, composite events, and the VM-side hold gate
//! that queues events without ever dropping one.

mod fixture;

use jdwp_mirror::commands::event_kinds;
use jdwp_mirror::events::EventKind;
use jdwp_mirror::types::SuspendPolicy;
use jdwp_mirror::JdwpError;
use jpda_harness::SGNL_READY;
use std::time::Duration;

/// The VM announces itself with an unrequested VM_START event carrying
/// the initial thread.
#[tokio::test(flavor = "multi_thread")]
async fn vm_start_is_waiting_at_boot() {
    let mut session = fixture::boot(0).await;

    let set = session
        .events
        .receive_certain_event(event_kinds::VM_START)
        .await
        .unwrap();
    assert_eq!(set.suspend_policy, SuspendPolicy::None);
    assert_eq!(set.events.len(), 1);
    assert_eq!(set.events[0].request_id, 0);
    assert!(matches!(set.events[0].details, EventKind::VMStart { .. }));
    assert!(set.event_thread().is_some());
}

/// THREAD_START fires once per started thread, tagged with the request
/// that asked for it; an EventThread policy suspends the new thread and
/// the client tracker follows along from the event alone.
#[tokio::test(flavor = "multi_thread")]
async fn thread_starts_arrive_with_the_requested_policy() {
    let mut session = fixture::boot(3).await;

    let request_id = session
        .mirror
        .set_thread_start_request(SuspendPolicy::EventThread)
        .await
        .unwrap();

    session.sync.release().await.unwrap();

    for _ in 0..3 {
        let set = session
            .events
            .receive_certain_event(event_kinds::THREAD_START)
            .await
            .unwrap();
        assert_eq!(set.suspend_policy, SuspendPolicy::EventThread);
        assert_eq!(set.events[0].request_id, request_id);

        let thread = set.event_thread().unwrap();
        assert_eq!(
            session.mirror.thread_suspend_count(thread).await.unwrap(),
            1
        );
        assert_eq!(session.mirror.suspend_state().await.suspend_count(thread), 1);

        session.mirror.resume_thread(thread).await.unwrap();
    }
}

/// HoldEvents dams the stream without losing anything; ReleaseEvents
/// lets the queue out in occurrence order.
#[tokio::test(flavor = "multi_thread")]
async fn held_events_queue_until_released() {
    let mut session = fixture::boot(2).await;

    session
        .mirror
        .set_thread_start_request(SuspendPolicy::None)
        .await
        .unwrap();
    session.mirror.hold_events().await.unwrap();

    session.sync.release().await.unwrap();
    // The workers are up once the debuggee reaches its next rendezvous.
    session.sync.expect_message(SGNL_READY).await.unwrap();
    let workers = session.mirror.all_threads().await.unwrap()[1..].to_vec();

    // The automatic VM_START predates the hold and comes through.
    let set = session.events.receive_event().await.unwrap();
    assert!(set.has_kind(event_kinds::VM_START));

    // Nothing else may arrive while the gate is closed; a short timeout
    // is the absence assertion.
    let absent = session
        .events
        .receive_event_within(Duration::from_millis(300))
        .await;
    assert!(matches!(absent, Err(JdwpError::Timeout { .. })));

    // Open the gate: both starts come through, oldest first.
    session.mirror.release_events().await.unwrap();
    for expected in workers {
        let set = session
            .events
            .receive_certain_event(event_kinds::THREAD_START)
            .await
            .unwrap();
        assert_eq!(set.event_thread(), Some(expected));
    }
}

/// THREAD_DEATH fires for each dying worker, and the tracker drops its
/// bookkeeping for threads that are gone.
#[tokio::test(flavor = "multi_thread")]
async fn thread_deaths_are_reported_and_forgotten() {
    let mut session = fixture::boot(2).await;

    session
        .mirror
        .set_thread_start_request(SuspendPolicy::None)
        .await
        .unwrap();
    session
        .mirror
        .set_thread_death_request(SuspendPolicy::None)
        .await
        .unwrap();

    session.sync.release().await.unwrap();

    let mut started = Vec::new();
    for _ in 0..2 {
        let set = session
            .events
            .receive_certain_event(event_kinds::THREAD_START)
            .await
            .unwrap();
        started.push(set.event_thread().unwrap());
    }

    // The tracker learned the new threads from the start events.
    let tracker = session.mirror.suspend_state().await;
    for thread in &started {
        assert!(tracker.known_threads().contains(thread));
    }

    // Let the workers die; deaths arrive in the same order the threads
    // started.
    session.sync.release().await.unwrap();
    for expected in &started {
        let set = session
            .events
            .receive_certain_event(event_kinds::THREAD_DEATH)
            .await
            .unwrap();
        assert_eq!(set.event_thread(), Some(*expected));
        assert!(matches!(
            set.events[0].details,
            EventKind::ThreadDeath { .. }
        ));
    }

    let tracker = session.mirror.suspend_state().await;
    for thread in &started {
        assert!(!tracker.known_threads().contains(thread));
    }
}
