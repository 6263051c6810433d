// StringReference command set
//
// Commands for working with String objects in the debuggee

use crate::commands::{command_sets, string_reference_commands};
use crate::mirror::VmMirror;
use crate::protocol::JdwpResult;
use crate::types::StringId;

impl VmMirror {
    /// Get the value of a String object (StringReference.Value)
    ///
    /// The id is typically one returned by
    /// [`create_string`](VmMirror::create_string) or found in a reply. A
    /// stale or disposed id answers INVALID_OBJECT or INVALID_STRING.
    pub async fn string_value(&self, string: StringId) -> JdwpResult<String> {
        let mut data = Vec::new();
        self.writer(&mut data).put_string_id(string);

        let reply = self
            .command(
                command_sets::STRING_REFERENCE,
                string_reference_commands::VALUE,
                data,
            )
            .await?;

        let mut cursor = self.cursor(&reply);
        let value = cursor.next_string()?;
        cursor.expect_end()?;
        Ok(value)
    }
}
