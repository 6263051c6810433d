// ObjectReference command set

use crate::commands::{command_sets, object_reference_commands};
use crate::mirror::VmMirror;
use crate::protocol::JdwpResult;
use crate::types::{ObjectId, ReferenceTypeId};

impl VmMirror {
    /// Runtime type of an object (ObjectReference.ReferenceType), as a
    /// (refTypeTag, typeID) pair.
    pub async fn object_reference_type(
        &self,
        object: ObjectId,
    ) -> JdwpResult<(u8, ReferenceTypeId)> {
        let mut data = Vec::new();
        self.writer(&mut data).put_object_id(object);

        let reply = self
            .command(
                command_sets::OBJECT_REFERENCE,
                object_reference_commands::REFERENCE_TYPE,
                data,
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let tag = cursor.next_u8()?;
        let type_id = cursor.next_reference_type_id()?;
        cursor.expect_end()?;
        Ok((tag, type_id))
    }
}
