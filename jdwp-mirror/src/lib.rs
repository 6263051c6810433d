// Debugger-side JDWP protocol core
//
// Implements the debugger half of the Java Debug Wire Protocol:
// - Packet framing and typed field cursors
// - Transport setup (attach and listen) with the ASCII handshake
// - Reply correlation over one demultiplexing task
// - A VM mirror carrying negotiated ID sizes, capabilities, and
//   per-thread suspend bookkeeping
// - Ordered, never-dropping delivery of composite events

pub mod channel;
pub mod commands;
pub mod connection;
pub mod cursor;
pub mod eventloop;
pub mod eventrequest;
pub mod events;
pub mod mirror;
pub mod object;
pub mod protocol;
pub mod string;
pub mod suspend;
pub mod thread;
pub mod types;
pub mod vm;

pub use channel::EventChannel;
pub use connection::JdwpConnection;
pub use mirror::{ReplyOutcome, Timeouts, VmMirror};
pub use protocol::{JdwpError, JdwpResult};
pub use suspend::SuspendTracker;
pub use types::{IdSizes, SuspendPolicy};
