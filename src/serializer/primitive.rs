use chrono::{DateTime, Utc};

use crate::command::CommandContext;
use crate::core::{EngineError, Result};
use crate::serializer::fields::{get_byte_array, set_byte_array, ValueFields};
use crate::serializer::TypedValueSerializer;
use crate::value::{ObjectLike, SharedObject, TypedValue, ValueType};

/// Serializer for one primitive value kind.
///
/// Field mappings are direct: boolean and date go through the long slot
/// (0/1, epoch millis), integral kinds share the long slot, strings use the
/// text slot, raw bytes use the blob. The stored serializer name
/// disambiguates kinds that share a slot on read.
///
/// The name defaults to the lower-cased kind name; a second serializer for
/// the same kind must use a distinct name.
#[derive(Debug)]
pub struct PrimitiveValueSerializer {
    value_type: ValueType,
}

impl PrimitiveValueSerializer {
    pub fn new(value_type: ValueType) -> Self {
        debug_assert!(value_type.is_primitive());
        Self { value_type }
    }

    fn untyped_matches(&self, object: &SharedObject) -> bool {
        let object = object.borrow();
        let any = object.as_any();
        match self.value_type {
            ValueType::Boolean => any.is::<bool>(),
            ValueType::Bytes => any.is::<Vec<u8>>(),
            ValueType::Date => any.is::<DateTime<Utc>>(),
            ValueType::Double => any.is::<f64>(),
            ValueType::Integer => any.is::<i32>(),
            ValueType::Long => any.is::<i64>(),
            ValueType::Short => any.is::<i16>(),
            ValueType::String => any.is::<String>(),
            // a present value is never of the null kind
            _ => false,
        }
    }

    fn typed_from_untyped(&self, object: Option<&SharedObject>) -> TypedValue {
        let object = match object {
            Some(object) => object,
            None => return self.typed_null(),
        };
        let object = object.borrow();
        let any = object.as_any();
        match self.value_type {
            ValueType::Boolean => TypedValue::Boolean(any.downcast_ref::<bool>().copied()),
            ValueType::Bytes => TypedValue::Bytes(any.downcast_ref::<Vec<u8>>().cloned()),
            ValueType::Date => TypedValue::Date(any.downcast_ref::<DateTime<Utc>>().copied()),
            ValueType::Double => TypedValue::Double(any.downcast_ref::<f64>().copied()),
            ValueType::Integer => TypedValue::Integer(any.downcast_ref::<i32>().copied()),
            ValueType::Long => TypedValue::Long(any.downcast_ref::<i64>().copied()),
            ValueType::Short => TypedValue::Short(any.downcast_ref::<i16>().copied()),
            ValueType::String => TypedValue::String(any.downcast_ref::<String>().cloned()),
            _ => TypedValue::Null,
        }
    }

    fn typed_null(&self) -> TypedValue {
        match self.value_type {
            ValueType::Boolean => TypedValue::Boolean(None),
            ValueType::Bytes => TypedValue::Bytes(None),
            ValueType::Date => TypedValue::Date(None),
            ValueType::Double => TypedValue::Double(None),
            ValueType::Integer => TypedValue::Integer(None),
            ValueType::Long => TypedValue::Long(None),
            ValueType::Short => TypedValue::Short(None),
            ValueType::String => TypedValue::String(None),
            _ => TypedValue::Null,
        }
    }

    fn mismatch(&self, value: &TypedValue) -> EngineError {
        EngineError::TypeMismatch(format!(
            "serializer '{}' cannot write {}",
            self.name_str(),
            value
        ))
    }

    fn name_str(&self) -> &'static str {
        self.value_type.name()
    }
}

impl TypedValueSerializer for PrimitiveValueSerializer {
    fn name(&self) -> &str {
        self.name_str()
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn can_handle(&self, value: &TypedValue) -> bool {
        match value {
            TypedValue::Untyped(None) => true,
            TypedValue::Untyped(Some(object)) => self.untyped_matches(object),
            TypedValue::Null => self.value_type == ValueType::Null,
            typed => typed.value_type() == Some(self.value_type),
        }
    }

    fn write_value(
        &self,
        value: TypedValue,
        fields: &mut dyn ValueFields,
        ctx: &mut CommandContext,
    ) -> Result<TypedValue> {
        match (self.value_type, &value) {
            (ValueType::Boolean, TypedValue::Boolean(v)) => {
                fields.set_long_value(v.map(i64::from));
            }
            (ValueType::Bytes, TypedValue::Bytes(v)) => {
                set_byte_array(fields, v.clone(), ctx)?;
            }
            (ValueType::Date, TypedValue::Date(v)) => {
                fields.set_long_value(v.map(|date| date.timestamp_millis()));
            }
            (ValueType::Double, TypedValue::Double(v)) => {
                fields.set_double_value(*v);
            }
            (ValueType::Integer, TypedValue::Integer(v)) => {
                fields.set_long_value(v.map(i64::from));
            }
            (ValueType::Long, TypedValue::Long(v)) => {
                fields.set_long_value(*v);
            }
            (ValueType::Short, TypedValue::Short(v)) => {
                fields.set_long_value(v.map(i64::from));
            }
            (ValueType::String, TypedValue::String(v)) => {
                fields.set_text_value(v.clone());
            }
            (ValueType::Null, TypedValue::Null) => {}
            _ => return Err(self.mismatch(&value)),
        }
        Ok(value)
    }

    fn read_value(
        &self,
        fields: &dyn ValueFields,
        _deserialize: bool,
        ctx: &mut CommandContext,
    ) -> Result<TypedValue> {
        // primitive values are always deserialized
        let value = match self.value_type {
            ValueType::Boolean => TypedValue::Boolean(fields.long_value().map(|l| l != 0)),
            ValueType::Bytes => TypedValue::Bytes(get_byte_array(fields, ctx)?),
            ValueType::Date => TypedValue::Date(
                fields
                    .long_value()
                    .and_then(DateTime::<Utc>::from_timestamp_millis),
            ),
            ValueType::Double => TypedValue::Double(fields.double_value()),
            ValueType::Integer => TypedValue::Integer(fields.long_value().map(|l| l as i32)),
            ValueType::Long => TypedValue::Long(fields.long_value()),
            ValueType::Short => TypedValue::Short(fields.long_value().map(|l| l as i16)),
            ValueType::String => TypedValue::String(fields.text_value().map(str::to_string)),
            _ => TypedValue::Null,
        };
        Ok(value)
    }

    fn convert_to_typed(&self, value: &TypedValue) -> Result<TypedValue> {
        match value {
            TypedValue::Untyped(object) => Ok(self.typed_from_untyped(object.as_ref())),
            typed if typed.value_type() == Some(self.value_type) => Ok(typed.clone()),
            other => Err(self.mismatch(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::share_object;

    #[test]
    fn test_can_handle_matching_kind_and_typed_null() {
        let serializer = PrimitiveValueSerializer::new(ValueType::Integer);
        assert!(serializer.can_handle(&TypedValue::from(5i32)));
        assert!(serializer.can_handle(&TypedValue::Integer(None)));
        assert!(!serializer.can_handle(&TypedValue::from(5i64)));
        assert!(!serializer.can_handle(&TypedValue::Null));
    }

    #[test]
    fn test_untyped_resolution_by_runtime_type() {
        let integer = PrimitiveValueSerializer::new(ValueType::Integer);
        let string = PrimitiveValueSerializer::new(ValueType::String);

        let untyped_int = TypedValue::untyped(Some(share_object(5i32)));
        assert!(integer.can_handle(&untyped_int));
        assert!(!string.can_handle(&untyped_int));

        // untyped null is acceptable to every primitive serializer
        assert!(integer.can_handle(&TypedValue::untyped(None)));
        assert!(string.can_handle(&TypedValue::untyped(None)));
    }

    #[test]
    fn test_convert_untyped_infers_the_kind() {
        let serializer = PrimitiveValueSerializer::new(ValueType::Long);
        let converted = serializer
            .convert_to_typed(&TypedValue::untyped(Some(share_object(9i64))))
            .unwrap();
        assert_eq!(converted, TypedValue::from(9i64));

        let null = serializer.convert_to_typed(&TypedValue::untyped(None)).unwrap();
        assert_eq!(null, TypedValue::Long(None));
    }
}
