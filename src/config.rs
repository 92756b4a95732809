use std::sync::Arc;

use crate::serializer::{
    JsonFormat, MsgpackFormat, ObjectValueSerializer, PrimitiveValueSerializer,
    VariableSerializers,
};
use crate::value::{ObjectTypeRegistry, ValueType, ValueTypeResolver};

/// Process-wide engine configuration: the serializer registry, the value
/// type resolver and the object type registry. Built once, shared by every
/// command context.
pub struct EngineConfiguration {
    serializers: VariableSerializers,
    value_types: ValueTypeResolver,
    object_types: Arc<ObjectTypeRegistry>,
}

impl EngineConfiguration {
    /// Default configuration: one serializer per primitive kind (the null
    /// serializer first, so untyped nulls resolve to the null kind), then
    /// the JSON and MessagePack object serializers.
    pub fn new(object_types: ObjectTypeRegistry) -> Self {
        let object_types = Arc::new(object_types);
        let mut serializers = VariableSerializers::new();

        serializers.register(Arc::new(PrimitiveValueSerializer::new(ValueType::Null)));
        for value_type in [
            ValueType::Boolean,
            ValueType::Bytes,
            ValueType::Date,
            ValueType::Double,
            ValueType::Integer,
            ValueType::Long,
            ValueType::Short,
            ValueType::String,
        ] {
            serializers.register(Arc::new(PrimitiveValueSerializer::new(value_type)));
        }
        serializers.register(Arc::new(ObjectValueSerializer::new(
            "object-json",
            Arc::new(JsonFormat),
            object_types.clone(),
        )));
        serializers.register(Arc::new(ObjectValueSerializer::new(
            "object-msgpack",
            Arc::new(MsgpackFormat),
            object_types.clone(),
        )));

        Self {
            serializers,
            value_types: ValueTypeResolver::new(),
            object_types,
        }
    }

    /// Configuration with a custom serializer registry.
    pub fn with_serializers(
        serializers: VariableSerializers,
        object_types: Arc<ObjectTypeRegistry>,
    ) -> Self {
        Self {
            serializers,
            value_types: ValueTypeResolver::new(),
            object_types,
        }
    }

    pub fn serializers(&self) -> &VariableSerializers {
        &self.serializers
    }

    pub fn value_types(&self) -> &ValueTypeResolver {
        &self.value_types
    }

    pub fn object_types(&self) -> &Arc<ObjectTypeRegistry> {
        &self.object_types
    }
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self::new(ObjectTypeRegistry::new())
    }
}

impl std::fmt::Debug for EngineConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfiguration")
            .field("serializers", &self.serializers)
            .field("object_types", &self.object_types)
            .finish()
    }
}
