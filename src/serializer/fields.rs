use crate::command::CommandContext;
use crate::core::Result;
use crate::entity::ByteArrayEntity;

/// The narrow storage-facing interface serializers read and write.
///
/// A handful of scalar slots plus one blob reference; exactly one logical
/// value is represented by a subset of these at a time. Writing a new kind
/// clears the fields the previous kind used.
pub trait ValueFields {
    fn variable_name(&self) -> &str;

    fn long_value(&self) -> Option<i64>;
    fn set_long_value(&mut self, value: Option<i64>);

    fn double_value(&self) -> Option<f64>;
    fn set_double_value(&mut self, value: Option<f64>);

    fn text_value(&self) -> Option<&str>;
    fn set_text_value(&mut self, value: Option<String>);

    fn text_value2(&self) -> Option<&str>;
    fn set_text_value2(&mut self, value: Option<String>);

    fn byte_array_id(&self) -> Option<&str>;
    fn set_byte_array_id(&mut self, id: Option<String>);

    fn data_format_id(&self) -> Option<&str>;
    fn set_data_format_id(&mut self, id: Option<String>);

    /// Id of the owning entity when this holder is a managed, cacheable
    /// entity; `None` for detached holders. Gates dirty-check registration.
    fn dirty_check_id(&self) -> Option<&str> {
        None
    }
}

/// Replace the blob payload behind `fields`.
///
/// The old blob entity (if any) is marked deleted, never mutated; a non-null
/// payload is inserted as a fresh blob entity and its id stored.
pub fn set_byte_array(
    fields: &mut dyn ValueFields,
    bytes: Option<Vec<u8>>,
    ctx: &mut CommandContext,
) -> Result<()> {
    if let Some(existing_id) = fields.byte_array_id().map(str::to_string) {
        ctx.delete_byte_array(&existing_id)?;
        fields.set_byte_array_id(None);
    }
    if let Some(bytes) = bytes {
        let entity = ByteArrayEntity::new(Some(fields.variable_name().to_string()), bytes);
        let id = ctx.insert_byte_array(entity)?;
        fields.set_byte_array_id(Some(id));
    }
    Ok(())
}

/// Resolve the blob payload behind `fields` within the current command.
pub fn get_byte_array(fields: &dyn ValueFields, ctx: &mut CommandContext) -> Result<Option<Vec<u8>>> {
    match fields.byte_array_id().map(str::to_string) {
        Some(id) => Ok(ctx
            .get_byte_array(&id)?
            .map(|entity| entity.borrow().bytes().to_vec())),
        None => Ok(None),
    }
}
