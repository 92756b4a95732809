// ============================================================================
// Typed-Value Serializers
// ============================================================================
//
// Serializers convert between typed values and the flat value fields a
// variable-holding entity exposes. The registry keeps them in registration
// order; write-side resolution is a capability probe (first serializer whose
// predicate accepts the value wins), read-side resolution is a direct lookup
// by the name stored next to the value.
// ============================================================================

mod fields;
mod formats;
mod object;
mod primitive;

use std::sync::Arc;

use log::trace;

use crate::command::CommandContext;
use crate::core::{EngineError, Result};
use crate::value::{TypedValue, ValueType};

pub use fields::{get_byte_array, set_byte_array, ValueFields};
pub use formats::{FormatError, JsonFormat, MsgpackFormat};
pub use object::{ObjectValueSerializer, SerializationFormat};
pub use primitive::PrimitiveValueSerializer;

pub trait TypedValueSerializer: std::fmt::Debug {
    /// Stable identifier persisted alongside the value.
    fn name(&self) -> &str;

    /// The kind of value this serializer produces.
    fn value_type(&self) -> ValueType;

    /// Capability probe used for write-side resolution.
    fn can_handle(&self, value: &TypedValue) -> bool;

    /// Write the value into the fields, returning the value as written
    /// (object values gain bytes, format and type name).
    fn write_value(
        &self,
        value: TypedValue,
        fields: &mut dyn ValueFields,
        ctx: &mut CommandContext,
    ) -> Result<TypedValue>;

    /// Reconstruct a typed value from the fields.
    fn read_value(
        &self,
        fields: &dyn ValueFields,
        deserialize: bool,
        ctx: &mut CommandContext,
    ) -> Result<TypedValue>;

    /// Infer a concrete typed value from an untyped one.
    fn convert_to_typed(&self, value: &TypedValue) -> Result<TypedValue>;
}

/// Ordered set of serializers.
pub struct VariableSerializers {
    serializers: Vec<Arc<dyn TypedValueSerializer>>,
}

impl VariableSerializers {
    pub fn new() -> Self {
        Self {
            serializers: Vec::new(),
        }
    }

    /// Register a serializer. Registration order determines write-side
    /// resolution priority.
    pub fn register(&mut self, serializer: Arc<dyn TypedValueSerializer>) {
        self.serializers.push(serializer);
    }

    /// Read-side resolution: direct lookup by stored name.
    pub fn serializer_by_name(&self, name: &str) -> Option<Arc<dyn TypedValueSerializer>> {
        self.serializers
            .iter()
            .find(|serializer| serializer.name() == name)
            .cloned()
    }

    /// Write-side resolution: first serializer accepting the value wins.
    pub fn find_serializer_for(&self, value: &TypedValue) -> Result<Arc<dyn TypedValueSerializer>> {
        for serializer in &self.serializers {
            if serializer.can_handle(value) {
                trace!("resolved serializer '{}' for {}", serializer.name(), value);
                return Ok(serializer.clone());
            }
        }
        Err(EngineError::NoSerializerFound(value.to_string()))
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }
}

impl Default for VariableSerializers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VariableSerializers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.serializers.iter().map(|s| s.name()).collect();
        f.debug_struct("VariableSerializers")
            .field("serializers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectTypeRegistry;

    fn default_registry() -> VariableSerializers {
        let mut serializers = VariableSerializers::new();
        let object_types = Arc::new(ObjectTypeRegistry::new());
        for value_type in ValueType::ALL {
            if value_type.is_primitive() {
                serializers.register(Arc::new(PrimitiveValueSerializer::new(value_type)));
            }
        }
        serializers.register(Arc::new(ObjectValueSerializer::new(
            "object-json",
            Arc::new(JsonFormat),
            object_types.clone(),
        )));
        serializers.register(Arc::new(ObjectValueSerializer::new(
            "object-msgpack",
            Arc::new(MsgpackFormat),
            object_types,
        )));
        serializers
    }

    #[test]
    fn test_lookup_by_name() {
        let serializers = default_registry();
        assert_eq!(
            serializers.serializer_by_name("integer").unwrap().value_type(),
            ValueType::Integer
        );
        assert!(serializers.serializer_by_name("bogus").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let serializers = default_registry();
        let found = serializers
            .find_serializer_for(&TypedValue::from(42i32))
            .unwrap();
        assert_eq!(found.name(), "integer");
    }

    #[test]
    fn test_typed_null_resolves_to_its_own_kind() {
        let serializers = default_registry();
        let found = serializers
            .find_serializer_for(&TypedValue::String(None))
            .unwrap();
        assert_eq!(found.name(), "string");
    }

    #[test]
    fn test_no_match_is_a_configuration_error() {
        let serializers = VariableSerializers::new();
        let err = serializers
            .find_serializer_for(&TypedValue::from(1i32))
            .unwrap_err();
        assert!(matches!(err, EngineError::NoSerializerFound(_)));
    }
}
