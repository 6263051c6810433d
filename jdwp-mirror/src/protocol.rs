// JDWP packet framing and the protocol error taxonomy
//
// Reference: https://docs.oracle.com/javase/8/docs/platform/jpda/jdwp/jdwp-protocol.html

use bytes::{Buf, BufMut, BytesMut};
use std::time::Duration;
use thiserror::Error;

// JDWP uses big-endian (network byte order) for all multi-byte values.

pub type JdwpResult<T> = Result<T, JdwpError>;

#[derive(Debug, Error)]
pub enum JdwpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Truncated or malformed packet bytes. Distinct from a protocol-level
    /// error code, which arrives in a well-formed reply header.
    #[error("framing error: {0}")]
    Framing(String),

    #[error("invalid JDWP handshake")]
    InvalidHandshake,

    /// Non-zero error code in a reply header that the call site did not
    /// declare as tolerated.
    #[error("JDWP error {code} ({name}): {context}")]
    ErrorCode {
        code: u16,
        name: &'static str,
        context: String,
    },

    /// No reply or event within the deadline. Expected-and-asserted in some
    /// scenarios, fatal in others; never returns stale data either way.
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: String },

    #[error("connection closed")]
    ConnectionClosed,
}

// Both sides exchange these 14 bytes before any packet, debugger first.
pub const JDWP_HANDSHAKE: &[u8] = b"JDWP-Handshake";

// Packet layout, command and reply:
// length (4 bytes, includes header)
// id (4 bytes)
// flags (1 byte) - 0x00 = command, 0x80 = reply
// [command: command set (1 byte) + command (1 byte)]
// [reply: error code (2 bytes)]
// data (variable)

pub const HEADER_SIZE: usize = 11;
pub const COMMAND_FLAG: u8 = 0x00;
pub const REPLY_FLAG: u8 = 0x80;

/// An outbound (or, on the debuggee side, inbound) command packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

/// A reply correlated to a command by `id`. The error code lives in the
/// header; `data` still needs a [`PacketCursor`](crate::cursor::PacketCursor)
/// to be read out field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPacket {
    pub id: u32,
    pub error_code: u16,
    pub data: Vec<u8>,
}

/// An inbound non-reply packet as routed by the demux loop, before event
/// decoding. Composite events carry command set 64, command 100.
#[derive(Debug, Clone)]
pub struct EventPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

impl CommandPacket {
    pub fn new(id: u32, command_set: u8, command: u8) -> Self {
        Self {
            id,
            command_set,
            command,
            data: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(COMMAND_FLAG);
        buf.put_u8(self.command_set);
        buf.put_u8(self.command);
        buf.put_slice(&self.data);

        buf.to_vec()
    }

    pub fn decode(mut buf: &[u8]) -> JdwpResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(JdwpError::Framing(format!(
                "command packet too short: {} bytes",
                buf.len()
            )));
        }

        let total = buf.len();
        let length = buf.get_u32() as usize;
        if length != total {
            return Err(JdwpError::Framing(format!(
                "command length field {length} does not match {total} bytes on the wire"
            )));
        }

        let id = buf.get_u32();
        let flags = buf.get_u8();
        if flags & REPLY_FLAG != 0 {
            return Err(JdwpError::Framing(format!(
                "reply flag set on a command packet: {flags:#x}"
            )));
        }

        let command_set = buf.get_u8();
        let command = buf.get_u8();

        Ok(Self {
            id,
            command_set,
            command,
            data: buf.to_vec(),
        })
    }
}

impl ReplyPacket {
    pub fn new(id: u32, error_code: u16) -> Self {
        Self {
            id,
            error_code,
            data: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(REPLY_FLAG);
        buf.put_u16(self.error_code);
        buf.put_slice(&self.data);

        buf.to_vec()
    }

    pub fn decode(mut buf: &[u8]) -> JdwpResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(JdwpError::Framing(format!(
                "reply packet too short: {} bytes",
                buf.len()
            )));
        }

        let total = buf.len();
        let length = buf.get_u32() as usize;
        if length != total {
            return Err(JdwpError::Framing(format!(
                "reply length field {length} does not match {total} bytes on the wire"
            )));
        }

        let id = buf.get_u32();
        let flags = buf.get_u8();
        if flags & REPLY_FLAG == 0 {
            return Err(JdwpError::Framing(format!("reply flag missing: {flags:#x}")));
        }

        let error_code = buf.get_u16();

        Ok(Self {
            id,
            error_code,
            data: buf.to_vec(),
        })
    }

    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    pub fn error_name(&self) -> &'static str {
        error_name(self.error_code)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One-line diagnostic form used in failure reports: header fields plus
    /// a bounded hex dump of the data.
    pub fn dump(&self) -> String {
        format!(
            "reply id={} error={}({}) data[{}]={}",
            self.id,
            self.error_name(),
            self.error_code,
            self.data.len(),
            hex_dump(&self.data)
        )
    }
}

const DUMP_LIMIT: usize = 64;

fn hex_dump(data: &[u8]) -> String {
    let shown = &data[..data.len().min(DUMP_LIMIT)];
    let mut out = String::with_capacity(shown.len() * 3);
    for (i, b) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02x}"));
    }
    if data.len() > DUMP_LIMIT {
        out.push_str(" ..");
    }
    out
}

/// Symbolic name for a JDWP reply error code. Unknown codes come back as
/// `UNKNOWN_ERROR`; callers treat those as hard failures unless whitelisted.
pub fn error_name(code: u16) -> &'static str {
    match code {
        0 => "NONE",
        10 => "INVALID_THREAD",
        11 => "INVALID_THREAD_GROUP",
        12 => "INVALID_PRIORITY",
        13 => "THREAD_NOT_SUSPENDED",
        14 => "THREAD_SUSPENDED",
        20 => "INVALID_OBJECT",
        21 => "INVALID_CLASS",
        22 => "CLASS_NOT_PREPARED",
        23 => "INVALID_METHODID",
        24 => "INVALID_LOCATION",
        25 => "INVALID_FIELDID",
        30 => "INVALID_FRAMEID",
        31 => "NO_MORE_FRAMES",
        32 => "OPAQUE_FRAME",
        33 => "NOT_CURRENT_FRAME",
        34 => "TYPE_MISMATCH",
        35 => "INVALID_SLOT",
        40 => "DUPLICATE",
        41 => "NOT_FOUND",
        50 => "INVALID_MONITOR",
        51 => "NOT_MONITOR_OWNER",
        52 => "INTERRUPT",
        60 => "INVALID_CLASS_FORMAT",
        61 => "CIRCULAR_CLASS_DEFINITION",
        62 => "FAILS_VERIFICATION",
        63 => "ADD_METHOD_NOT_IMPLEMENTED",
        64 => "SCHEMA_CHANGE_NOT_IMPLEMENTED",
        65 => "INVALID_TYPESTATE",
        66 => "HIERARCHY_CHANGE_NOT_IMPLEMENTED",
        67 => "DELETE_METHOD_NOT_IMPLEMENTED",
        68 => "UNSUPPORTED_VERSION",
        69 => "NAMES_DONT_MATCH",
        70 => "CLASS_MODIFIERS_CHANGE_NOT_IMPLEMENTED",
        71 => "METHOD_MODIFIERS_CHANGE_NOT_IMPLEMENTED",
        99 => "NOT_IMPLEMENTED",
        100 => "NULL_POINTER",
        101 => "ABSENT_INFORMATION",
        102 => "INVALID_EVENT_TYPE",
        103 => "ILLEGAL_ARGUMENT",
        110 => "OUT_OF_MEMORY",
        111 => "ACCESS_DENIED",
        112 => "VM_DEAD",
        113 => "INTERNAL",
        115 => "UNATTACHED_THREAD",
        500 => "INVALID_TAG",
        502 => "ALREADY_INVOKING",
        503 => "INVALID_INDEX",
        504 => "INVALID_LENGTH",
        506 => "INVALID_STRING",
        507 => "INVALID_CLASS_LOADER",
        508 => "INVALID_ARRAY",
        509 => "TRANSPORT_LOAD",
        510 => "TRANSPORT_INIT",
        511 => "NATIVE_METHOD",
        512 => "INVALID_COUNT",
        _ => "UNKNOWN_ERROR",
    }
}
