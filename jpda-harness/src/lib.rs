// Test harness around jdwp-mirror
//
// Everything a protocol test needs besides the mirror itself: launching
// and reaping the debuggee process, the line-oriented phase synchronizer,
// and a scripted mock debuggee VM for the integration tests to debug.

pub mod debuggee;
pub mod error;
pub mod mock;
pub mod sync;

pub use debuggee::Debuggee;
pub use error::{HarnessError, HarnessResult};
pub use sync::{SyncChannel, SyncServer, SGNL_CONTINUE, SGNL_READY};
