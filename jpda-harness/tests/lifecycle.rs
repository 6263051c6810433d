//! Session lifecycle: introspection, capability-gated commands, Dispose,
//! Exit, and a clean full-scenario run.

mod fixture;

use fixture::STEP_TIMEOUT;
use jdwp_mirror::commands::event_kinds;
use jdwp_mirror::types::SuspendPolicy;
use jdwp_mirror::JdwpError;

/// Version and classpath answers are static facts about the mock VM.
#[tokio::test(flavor = "multi_thread")]
async fn version_and_paths() {
    let session = fixture::boot(0).await;

    let version = session.mirror.version().await.unwrap();
    assert_eq!(version.jdwp_major, 1);
    assert_eq!(version.jdwp_minor, 6);
    assert_eq!(version.vm_name, "MockVM");
    assert_eq!(version.vm_version, "1.0-mock");
    assert!(version.description.contains("Mock"));

    let paths = session.mirror.class_paths().await.unwrap();
    assert_eq!(paths.base_dir, "/opt/mockvm");
    assert_eq!(paths.classpaths, vec!["classes".to_string()]);
    assert_eq!(paths.boot_classpaths, vec!["lib/boot.jar".to_string()]);

    let groups = session.mirror.top_level_thread_groups().await.unwrap();
    assert_eq!(groups.len(), 1);
}

/// Capability-gated commands answer NOT_IMPLEMENTED, which the mirror
/// reports as an expected outcome rather than an error.
#[tokio::test(flavor = "multi_thread")]
async fn unimplemented_capabilities_are_expected_outcomes() {
    let session = fixture::boot(0).await;

    assert!(!session.mirror.capabilities().can_redefine_classes);
    assert!(!session.mirror.capabilities().can_set_default_stratum);

    let class = session.mirror.all_classes().await.unwrap()[0].type_id;
    let outcome = session
        .mirror
        .redefine_classes(&[(class, vec![0xCA, 0xFE, 0xBA, 0xBE])])
        .await
        .unwrap();
    assert!(outcome.is_expected_error());

    let outcome = session.mirror.set_default_stratum("Java").await.unwrap();
    assert!(outcome.is_expected_error());
}

/// Dispose ends the session: the VM hangs up, our suspend bookkeeping is
/// wiped, and later commands fail instead of hanging.
#[tokio::test(flavor = "multi_thread")]
async fn dispose_detaches_and_wipes_state() {
    let session = fixture::boot(0).await;

    let threads = session.mirror.all_threads().await.unwrap();
    session.mirror.suspend().await.unwrap();
    assert!(session.mirror.suspend_state().await.is_suspended(threads[0]));

    session.mirror.dispose().await.unwrap();
    assert!(session.mirror.suspend_state().await.known_threads().is_empty());

    // Whether the next command sees the closed channel or loses the race
    // and fails on the socket depends on timing; either way it fails fast.
    let err = session.mirror.version().await.unwrap_err();
    assert!(matches!(
        err,
        JdwpError::ConnectionClosed | JdwpError::Io(_)
    ));
}

/// VirtualMachine.Exit terminates the debuggee with the requested code,
/// wherever the scenario happens to be.
#[tokio::test(flavor = "multi_thread")]
async fn exit_code_propagates_to_the_process() {
    let mut session = fixture::boot(2).await;

    session.mirror.exit(99).await.unwrap();
    session
        .debuggee
        .expect_exit_code(99, STEP_TIMEOUT)
        .await
        .unwrap();
}

/// The full scripted scenario walked to its natural end: VM_DEATH and a
/// zero exit.
#[tokio::test(flavor = "multi_thread")]
async fn clean_scenario_run_exits_zero() {
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

    // Phase 1: workers start.
    session.sync.release().await.unwrap();
    for _ in 0..2 {
        session
            .events
            .receive_certain_event(event_kinds::THREAD_START)
            .await
            .unwrap();
    }

    // Phase 2: workers die.
    session.sync.release().await.unwrap();
    for _ in 0..2 {
        session
            .events
            .receive_certain_event(event_kinds::THREAD_DEATH)
            .await
            .unwrap();
    }

    // Phase 3: the scenario winds down with VM_DEATH and a clean exit.
    session.sync.release().await.unwrap();
    let set = session
        .events
        .receive_certain_event(event_kinds::VM_DEATH)
        .await
        .unwrap();
    assert_eq!(set.events[0].request_id, 0);

    session
        .debuggee
        .expect_exit_code(0, STEP_TIMEOUT)
        .await
        .unwrap();
}
