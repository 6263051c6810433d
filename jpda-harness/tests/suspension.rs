//! Thread suspension over the wire: nested counts, VM-wide sweeps, and
//! the client-side tracker staying in step with the VM.

mod fixture;

use jdwp_mirror::commands::error_codes;
use jdwp_mirror::types::ThreadStatus;
use jdwp_mirror::JdwpError;
use jpda_harness::SGNL_READY;

/// Suspensions nest: two suspends need two resumes, and resuming a
/// running thread is a no-op.
#[tokio::test(flavor = "multi_thread")]
async fn nested_suspension_counts() {
    let mut session = fixture::boot(10).await;

    // Only main is alive until the scenario starts the workers.
    let threads = session.mirror.all_threads().await.unwrap();
    assert_eq!(threads.len(), 1);

    // Let the workers start, and wait for the debuggee to reach its next
    // rendezvous so they are all up.
    session.sync.release().await.unwrap();
    session.sync.expect_message(SGNL_READY).await.unwrap();

    let threads = session.mirror.all_threads().await.unwrap();
    assert_eq!(threads.len(), 11);
    assert_eq!(
        session.mirror.thread_name(threads[0]).await.unwrap(),
        "main"
    );

    let worker = threads[1];
    assert!(session
        .mirror
        .thread_name(worker)
        .await
        .unwrap()
        .starts_with("worker-"));

    // Suspend twice; the VM reports the nesting and the suspended bit.
    session.mirror.suspend_thread(worker).await.unwrap();
    session.mirror.suspend_thread(worker).await.unwrap();
    assert_eq!(
        session.mirror.thread_suspend_count(worker).await.unwrap(),
        2
    );

    let (thread_status, suspend_status) = session.mirror.thread_status(worker).await.unwrap();
    assert_eq!(thread_status, ThreadStatus::Running);
    assert!(suspend_status.is_suspended());

    // The client-side tracker mirrors the count.
    assert_eq!(session.mirror.suspend_state().await.suspend_count(worker), 2);

    // One resume leaves it suspended, the second frees it.
    session.mirror.resume_thread(worker).await.unwrap();
    assert_eq!(
        session.mirror.thread_suspend_count(worker).await.unwrap(),
        1
    );
    session.mirror.resume_thread(worker).await.unwrap();
    assert_eq!(
        session.mirror.thread_suspend_count(worker).await.unwrap(),
        0
    );

    let (_, suspend_status) = session.mirror.thread_status(worker).await.unwrap();
    assert!(!suspend_status.is_suspended());

    // Resuming a running thread changes nothing.
    session.mirror.resume_thread(worker).await.unwrap();
    assert_eq!(
        session.mirror.thread_suspend_count(worker).await.unwrap(),
        0
    );
}

/// VirtualMachine.Suspend and Resume sweep every live thread at once.
#[tokio::test(flavor = "multi_thread")]
async fn vm_wide_suspension() {
    let mut session = fixture::boot(3).await;

    session.sync.release().await.unwrap();
    session.sync.expect_message(SGNL_READY).await.unwrap();

    let threads = session.mirror.all_threads().await.unwrap();
    assert_eq!(threads.len(), 4);

    session.mirror.suspend().await.unwrap();
    for thread in &threads {
        assert_eq!(
            session.mirror.thread_suspend_count(*thread).await.unwrap(),
            1
        );
    }

    // The tracker saw the sweep too.
    assert_eq!(
        session.mirror.suspend_state().await.suspended_threads().len(),
        4
    );

    session.mirror.resume().await.unwrap();
    for thread in &threads {
        assert_eq!(
            session.mirror.thread_suspend_count(*thread).await.unwrap(),
            0
        );
    }
    assert!(session
        .mirror
        .suspend_state()
        .await
        .suspended_threads()
        .is_empty());
}

/// Commands naming a thread the VM does not know come back as clean
/// protocol errors, and the session keeps working afterwards.
#[tokio::test(flavor = "multi_thread")]
async fn unknown_thread_is_a_protocol_error() {
    let session = fixture::boot(0).await;

    let err = session.mirror.thread_name(0xdead_beef).await.unwrap_err();
    match err {
        JdwpError::ErrorCode {
            code,
            name,
            context,
        } => {
            assert_eq!(code, error_codes::INVALID_THREAD);
            assert_eq!(name, "INVALID_THREAD");
            assert!(context.contains("ThreadReference.Name"));
        }
        other => panic!("expected an error-code reply, got {other:?}"),
    }

    let threads = session.mirror.all_threads().await.unwrap();
    assert_eq!(
        session.mirror.thread_name(threads[0]).await.unwrap(),
        "main"
    );
}
