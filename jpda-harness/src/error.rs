// Harness-level failures
//
// Wraps protocol errors from the mirror crate and adds the failure modes
// owned by the harness itself: the side synchronization channel and the
// debuggee process lifecycle.

use std::time::Duration;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Jdwp(#[from] jdwp_mirror::JdwpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent a different token than the rendezvous step expected.
    #[error("synchronizer expected {expected:?}, received {received:?}")]
    SyncMismatch { expected: String, received: String },

    #[error("synchronizer channel closed")]
    SyncClosed,

    #[error("no synchronizer message within {0:?}")]
    SyncTimeout(Duration),

    #[error("debuggee exited with code {actual}, expected {expected}")]
    ExitCode { expected: i32, actual: i32 },

    #[error("debuggee did not exit within {0:?}")]
    ExitTimeout(Duration),
}
