// Typed cursors over packet data
//
// Reply and event payloads are read sequentially in protocol-defined field
// order. The cursor owns its position outright (never shared, never aliased)
// and consumes each field at its exact wire width, with ID widths taken from
// the negotiated IdSizes it was built with.

use crate::protocol::{JdwpError, JdwpResult};
use crate::types::{
    FieldId, FrameId, IdSizes, Location, MethodId, ObjectId, ReferenceTypeId, StringId,
    ThreadGroupId, ThreadId,
};
use bytes::BufMut;

pub struct PacketCursor<'a> {
    data: &'a [u8],
    pos: usize,
    sizes: IdSizes,
}

impl<'a> PacketCursor<'a> {
    pub fn new(data: &'a [u8], sizes: IdSizes) -> Self {
        Self { data, pos: 0, sizes }
    }

    fn take(&mut self, what: &str, n: usize) -> JdwpResult<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if remaining < n {
            return Err(JdwpError::Framing(format!(
                "truncated {what}: need {n} bytes, {remaining} left at offset {}",
                self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn next_u8(&mut self) -> JdwpResult<u8> {
        Ok(self.take("u8", 1)?[0])
    }

    pub fn next_bool(&mut self) -> JdwpResult<bool> {
        Ok(self.next_u8()? != 0)
    }

    pub fn next_u16(&mut self) -> JdwpResult<u16> {
        let b = self.take("u16", 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn next_i32(&mut self) -> JdwpResult<i32> {
        let b = self.take("i32", 4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn next_u32(&mut self) -> JdwpResult<u32> {
        let b = self.take("u32", 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn next_i64(&mut self) -> JdwpResult<i64> {
        let b = self.take("i64", 8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn next_u64(&mut self) -> JdwpResult<u64> {
        let b = self.take("u64", 8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// A JDWP string: u32 length prefix plus UTF-8 bytes, no terminator.
    pub fn next_string(&mut self) -> JdwpResult<String> {
        let len = self.next_u32()? as usize;
        let bytes = self.take("string body", len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| JdwpError::Framing(format!("invalid UTF-8 in string: {e}")))
    }

    fn next_id(&mut self, what: &str, width: u8) -> JdwpResult<u64> {
        let bytes = self.take(what, width as usize)?;
        let mut value = 0u64;
        for b in bytes {
            value = value << 8 | u64::from(*b);
        }
        Ok(value)
    }

    pub fn next_object_id(&mut self) -> JdwpResult<ObjectId> {
        self.next_id("objectID", self.sizes.object_id_size)
    }

    pub fn next_thread_id(&mut self) -> JdwpResult<ThreadId> {
        self.next_id("threadID", self.sizes.object_id_size)
    }

    pub fn next_thread_group_id(&mut self) -> JdwpResult<ThreadGroupId> {
        self.next_id("threadGroupID", self.sizes.object_id_size)
    }

    pub fn next_string_id(&mut self) -> JdwpResult<StringId> {
        self.next_id("stringID", self.sizes.object_id_size)
    }

    pub fn next_reference_type_id(&mut self) -> JdwpResult<ReferenceTypeId> {
        self.next_id("referenceTypeID", self.sizes.reference_type_id_size)
    }

    pub fn next_field_id(&mut self) -> JdwpResult<FieldId> {
        self.next_id("fieldID", self.sizes.field_id_size)
    }

    pub fn next_method_id(&mut self) -> JdwpResult<MethodId> {
        self.next_id("methodID", self.sizes.method_id_size)
    }

    pub fn next_frame_id(&mut self) -> JdwpResult<FrameId> {
        self.next_id("frameID", self.sizes.frame_id_size)
    }

    pub fn next_location(&mut self) -> JdwpResult<Location> {
        Ok(Location {
            type_tag: self.next_u8()?,
            class_id: self.next_reference_type_id()?,
            method_id: self.next_method_id()?,
            index: self.next_u64()?,
        })
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Discarding a reply with unread bytes means the caller misparsed the
    /// field order; surface that as a framing error instead of losing it.
    pub fn expect_end(&self) -> JdwpResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(JdwpError::Framing(format!(
                "{n} unread trailing bytes at offset {}",
                self.pos
            ))),
        }
    }
}

/// Write-side twin of [`PacketCursor`], appending fields to a command (or,
/// on the debuggee side, reply) body at the same negotiated widths.
pub struct PacketWriter<'a> {
    buf: &'a mut Vec<u8>,
    sizes: IdSizes,
}

impl<'a> PacketWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>, sizes: IdSizes) -> Self {
        Self { buf, sizes }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn put_bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(value as u8);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.put_i64(value);
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.put_u64(value);
        self
    }

    pub fn put_string(&mut self, value: &str) -> &mut Self {
        self.buf.put_u32(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn put_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.put_slice(value);
        self
    }

    fn put_id(&mut self, value: u64, width: u8) -> &mut Self {
        debug_assert!(
            width == 8 || value >> (width * 8) == 0,
            "ID {value:#x} does not fit in {width} bytes"
        );
        let be = value.to_be_bytes();
        self.buf.put_slice(&be[8 - width as usize..]);
        self
    }

    pub fn put_object_id(&mut self, value: ObjectId) -> &mut Self {
        self.put_id(value, self.sizes.object_id_size)
    }

    pub fn put_thread_id(&mut self, value: ThreadId) -> &mut Self {
        self.put_id(value, self.sizes.object_id_size)
    }

    pub fn put_thread_group_id(&mut self, value: ThreadGroupId) -> &mut Self {
        self.put_id(value, self.sizes.object_id_size)
    }

    pub fn put_string_id(&mut self, value: StringId) -> &mut Self {
        self.put_id(value, self.sizes.object_id_size)
    }

    pub fn put_reference_type_id(&mut self, value: ReferenceTypeId) -> &mut Self {
        self.put_id(value, self.sizes.reference_type_id_size)
    }

    pub fn put_field_id(&mut self, value: FieldId) -> &mut Self {
        self.put_id(value, self.sizes.field_id_size)
    }

    pub fn put_method_id(&mut self, value: MethodId) -> &mut Self {
        self.put_id(value, self.sizes.method_id_size)
    }

    pub fn put_frame_id(&mut self, value: FrameId) -> &mut Self {
        self.put_id(value, self.sizes.frame_id_size)
    }

    pub fn put_location(&mut self, location: &Location) -> &mut Self {
        self.put_u8(location.type_tag);
        self.put_reference_type_id(location.class_id);
        self.put_method_id(location.method_id);
        self.put_u64(location.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrow_sizes() -> IdSizes {
        IdSizes::new(2, 4, 4, 4, 8).unwrap()
    }

    #[test]
    fn typed_round_trip_with_narrow_ids() {
        let sizes = narrow_sizes();
        let mut buf = Vec::new();
        let mut w = PacketWriter::new(&mut buf, sizes);
        w.put_u8(7)
            .put_i32(-5)
            .put_string("Hello World!")
            .put_object_id(0xCAFE)
            .put_field_id(0xBEEF)
            .put_u64(0x1122334455667788);

        // 1 + 4 + (4 + 12) + 4 + 2 + 8
        assert_eq!(buf.len(), 35);

        let mut c = PacketCursor::new(&buf, sizes);
        assert_eq!(c.next_u8().unwrap(), 7);
        assert_eq!(c.next_i32().unwrap(), -5);
        assert_eq!(c.next_string().unwrap(), "Hello World!");
        assert_eq!(c.next_object_id().unwrap(), 0xCAFE);
        assert_eq!(c.next_field_id().unwrap(), 0xBEEF);
        assert_eq!(c.next_u64().unwrap(), 0x1122334455667788);
        c.expect_end().unwrap();
    }

    #[test]
    fn id_width_follows_negotiated_sizes() {
        let mut buf = Vec::new();
        PacketWriter::new(&mut buf, narrow_sizes()).put_thread_id(0x01020304);
        assert_eq!(buf, vec![0x01, 0x02, 0x03, 0x04]);

        let mut wide = Vec::new();
        PacketWriter::new(&mut wide, IdSizes::default()).put_thread_id(0x01020304);
        assert_eq!(wide, vec![0, 0, 0, 0, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn non_ascii_strings_survive() {
        let mut buf = Vec::new();
        PacketWriter::new(&mut buf, IdSizes::default()).put_string("スレッド-1");
        let mut c = PacketCursor::new(&buf, IdSizes::default());
        assert_eq!(c.next_string().unwrap(), "スレッド-1");
    }

    #[test]
    fn reading_past_the_end_is_a_framing_error() {
        let mut c = PacketCursor::new(&[0, 1], IdSizes::default());
        let err = c.next_i32().unwrap_err();
        assert!(matches!(err, JdwpError::Framing(_)));
    }

    #[test]
    fn truncated_string_body_is_a_framing_error() {
        // Length prefix claims 10 bytes, only 2 follow.
        let bytes = [0, 0, 0, 10, b'h', b'i'];
        let mut c = PacketCursor::new(&bytes, IdSizes::default());
        assert!(matches!(c.next_string(), Err(JdwpError::Framing(_))));
    }

    #[test]
    fn unread_trailing_bytes_are_detected() {
        let mut buf = Vec::new();
        PacketWriter::new(&mut buf, IdSizes::default())
            .put_u32(1)
            .put_u8(2);
        let mut c = PacketCursor::new(&buf, IdSizes::default());
        c.next_u32().unwrap();
        let err = c.expect_end().unwrap_err();
        assert!(matches!(err, JdwpError::Framing(_)));
    }

    #[test]
    fn location_round_trip() {
        let sizes = narrow_sizes();
        let loc = Location {
            type_tag: 1,
            class_id: 0x10,
            method_id: 0x20,
            index: 3,
        };
        let mut buf = Vec::new();
        PacketWriter::new(&mut buf, sizes).put_location(&loc);
        let mut c = PacketCursor::new(&buf, sizes);
        assert_eq!(c.next_location().unwrap(), loc);
        c.expect_end().unwrap();
    }
}
