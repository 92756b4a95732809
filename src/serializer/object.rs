use std::sync::Arc;

use crate::command::CommandContext;
use crate::core::{EngineError, Result};
use crate::serializer::fields::{get_byte_array, set_byte_array, ValueFields};
use crate::serializer::formats::FormatError;
use crate::serializer::TypedValueSerializer;
use crate::value::{Document, ObjectLike, ObjectValue, SharedObject, TypedValue, ValueType};

/// Byte-level codec over the neutral document tree; the two format-specific
/// primitives every object serializer is parameterized by.
pub trait SerializationFormat {
    /// Format identifier persisted in the data-format field.
    fn format_name(&self) -> &str;

    fn encode(&self, document: &Document) -> Result<Vec<u8>, FormatError>;

    fn decode(&self, bytes: &[u8]) -> Result<Document, FormatError>;
}

/// Serializer for object values in one serialization format.
///
/// Implements the write/read algorithm shared by all formats: a serialized
/// value passes its bytes through untouched, a deserialized value is encoded
/// (deriving the type name from the runtime type when undeclared), and the
/// stored triple is always blob + format id + type name. Live objects are
/// registered for flush-time dirty-checking so in-place mutation persists
/// without an explicit set.
pub struct ObjectValueSerializer {
    name: String,
    format: Arc<dyn SerializationFormat>,
    object_types: Arc<crate::value::ObjectTypeRegistry>,
}

impl ObjectValueSerializer {
    pub fn new(
        name: impl Into<String>,
        format: Arc<dyn SerializationFormat>,
        object_types: Arc<crate::value::ObjectTypeRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            object_types,
        }
    }

    pub fn serialization_format(&self) -> &str {
        self.format.format_name()
    }

    fn can_encode(&self, object: &SharedObject) -> bool {
        object.borrow().to_document().is_ok()
    }

    fn encode_object(&self, object: &SharedObject, variable: &str) -> Result<Vec<u8>> {
        let document =
            object
                .borrow()
                .to_document()
                .map_err(|e| EngineError::SerializationFailed {
                    variable: variable.to_string(),
                    cause: e.to_string(),
                })?;
        self.format
            .encode(&document)
            .map_err(|e| EngineError::SerializationFailed {
                variable: variable.to_string(),
                cause: e.to_string(),
            })
    }

    fn decode_object(
        &self,
        bytes: &[u8],
        type_name: Option<&str>,
        variable: &str,
    ) -> Result<SharedObject> {
        let document = self
            .format
            .decode(bytes)
            .map_err(|e| EngineError::DeserializationFailed {
                variable: variable.to_string(),
                cause: e.to_string(),
            })?;
        let type_name = type_name.ok_or_else(|| EngineError::DeserializationFailed {
            variable: variable.to_string(),
            cause: "no object type name stored".to_string(),
        })?;
        self.object_types
            .instantiate(type_name, document)
            .map_err(|e| EngineError::DeserializationFailed {
                variable: variable.to_string(),
                cause: e.to_string(),
            })
    }

    fn dirty_check_on_flush(
        &self,
        object: &SharedObject,
        serialized: &[u8],
        fields: &dyn ValueFields,
        ctx: &mut CommandContext,
    ) {
        // only holders backed by a managed, cacheable entity participate
        if let Some(id) = fields.dirty_check_id() {
            ctx.register_dirty_object(
                self.format.clone(),
                object.clone(),
                serialized.to_vec(),
                id.to_string(),
                fields.variable_name().to_string(),
            );
        }
    }
}

impl TypedValueSerializer for ObjectValueSerializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_type(&self) -> ValueType {
        ValueType::Object
    }

    fn can_handle(&self, value: &TypedValue) -> bool {
        match value {
            // untyped values are acceptable if the live value is encodable
            TypedValue::Untyped(None) => true,
            TypedValue::Untyped(Some(object)) => self.can_encode(object),
            TypedValue::Object(object_value) => {
                if !object_value.is_deserialized() {
                    // serialized object: the declared format must match,
                    // byte content is never inspected
                    return object_value.serialization_format()
                        == Some(self.serialization_format());
                }
                let object = match object_value.get_object() {
                    Ok(object) => object,
                    Err(_) => return false,
                };
                let can_serialize = match object {
                    Some(object) => self.can_encode(object),
                    None => true,
                };
                match object_value.serialization_format() {
                    Some(requested) => requested == self.serialization_format() && can_serialize,
                    None => can_serialize,
                }
            }
            _ => false,
        }
    }

    fn write_value(
        &self,
        value: TypedValue,
        fields: &mut dyn ValueFields,
        ctx: &mut CommandContext,
    ) -> Result<TypedValue> {
        let TypedValue::Object(mut object_value) = value else {
            return Err(EngineError::TypeMismatch(format!(
                "serializer '{}' cannot write a non-object value",
                self.name
            )));
        };

        let mut object_type_name = object_value.object_type_name().map(str::to_string);
        let mut serialized: Option<Vec<u8>> = None;

        if object_value.is_deserialized() {
            if let Some(object) = object_value.get_object()?.cloned() {
                if object_type_name.is_none() {
                    object_type_name = Some(object.borrow().object_type_name());
                }
                let bytes = self.encode_object(&object, fields.variable_name())?;
                if fields.byte_array_id().is_none() {
                    self.dirty_check_on_flush(&object, &bytes, fields, ctx);
                }
                serialized = Some(bytes);
            }
        } else {
            serialized = object_value.serialized_bytes().map(<[u8]>::to_vec);
            if object_type_name.is_none() && serialized.is_some() {
                return Err(EngineError::MissingTypeName(
                    fields.variable_name().to_string(),
                ));
            }
        }

        // write value and type to the fields
        set_byte_array(fields, serialized.clone(), ctx)?;
        fields.set_data_format_id(Some(self.serialization_format().to_string()));
        fields.set_text_value2(object_type_name.clone());

        // keep the in-memory value consistent with what was just persisted
        object_value.set_serialized(serialized);
        object_value.set_serialization_format(self.serialization_format());
        object_value.set_object_type_name(object_type_name);

        Ok(TypedValue::Object(object_value))
    }

    fn read_value(
        &self,
        fields: &dyn ValueFields,
        deserialize: bool,
        ctx: &mut CommandContext,
    ) -> Result<TypedValue> {
        let serialized = get_byte_array(fields, ctx)?;
        let object_type_name = fields.text_value2().map(str::to_string);

        if deserialize {
            let mut object: Option<SharedObject> = None;
            if let Some(bytes) = &serialized {
                let decoded =
                    self.decode_object(bytes, object_type_name.as_deref(), fields.variable_name())?;
                self.dirty_check_on_flush(&decoded, bytes, fields, ctx);
                object = Some(decoded);
            }
            Ok(TypedValue::Object(ObjectValue::new(
                object,
                serialized,
                Some(self.serialization_format().to_string()),
                object_type_name,
                true,
            )))
        } else {
            Ok(TypedValue::Object(ObjectValue::new(
                None,
                serialized,
                Some(self.serialization_format().to_string()),
                object_type_name,
                false,
            )))
        }
    }

    fn convert_to_typed(&self, value: &TypedValue) -> Result<TypedValue> {
        match value {
            // untyped values are always deserialized
            TypedValue::Untyped(Some(object)) => Ok(TypedValue::Object(ObjectValue::deserialized(
                object.clone(),
            ))),
            TypedValue::Untyped(None) => Ok(TypedValue::Object(ObjectValue::deserialized_null())),
            TypedValue::Object(object_value) => Ok(TypedValue::Object(object_value.clone())),
            other => Err(EngineError::TypeMismatch(format!(
                "serializer '{}' cannot convert {}",
                self.name, other
            ))),
        }
    }
}

impl std::fmt::Debug for ObjectValueSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectValueSerializer")
            .field("name", &self.name)
            .field("format", &self.format.format_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::formats::JsonFormat;
    use crate::value::{share_object, ObjectTypeRegistry};

    fn json_serializer() -> ObjectValueSerializer {
        ObjectValueSerializer::new(
            "object-json",
            Arc::new(JsonFormat),
            Arc::new(ObjectTypeRegistry::new()),
        )
    }

    #[test]
    fn test_serialized_value_requires_matching_format() {
        let serializer = json_serializer();
        let matching = TypedValue::Object(ObjectValue::serialized(
            Some(b"{}".to_vec()),
            "json",
            Some("X".into()),
        ));
        let other = TypedValue::Object(ObjectValue::serialized(
            Some(b"{}".to_vec()),
            "msgpack",
            Some("X".into()),
        ));
        assert!(serializer.can_handle(&matching));
        assert!(!serializer.can_handle(&other));
    }

    #[test]
    fn test_deserialized_value_with_format_request() {
        let serializer = json_serializer();
        let requested_json = TypedValue::Object(
            ObjectValue::deserialized(share_object(1i32)).with_serialization_format("json"),
        );
        let requested_other = TypedValue::Object(
            ObjectValue::deserialized(share_object(1i32)).with_serialization_format("msgpack"),
        );
        let no_request = TypedValue::Object(ObjectValue::deserialized(share_object(1i32)));
        assert!(serializer.can_handle(&requested_json));
        assert!(!serializer.can_handle(&requested_other));
        assert!(serializer.can_handle(&no_request));
    }

    #[test]
    fn test_rejects_primitive_values() {
        let serializer = json_serializer();
        assert!(!serializer.can_handle(&TypedValue::from(1i32)));
        assert!(!serializer.can_handle(&TypedValue::Null));
    }

    #[test]
    fn test_untyped_conversion_stays_deserialized() {
        let serializer = json_serializer();
        let converted = serializer
            .convert_to_typed(&TypedValue::untyped(Some(share_object(7i32))))
            .unwrap();
        let object_value = converted.as_object().unwrap();
        assert!(object_value.is_deserialized());
        assert!(!object_value.is_null());
    }
}
