use std::collections::HashMap;
use std::fmt;

/// The closed set of supported value kinds.
///
/// Every primitive kind maps 1:1 to a native scalar type; `Object` is the
/// only serializable kind and is stored as a byte payload plus metadata
/// rather than a native scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Bytes,
    Date,
    Double,
    Integer,
    Long,
    Null,
    Short,
    String,
    Object,
}

impl ValueType {
    pub const ALL: [ValueType; 10] = [
        ValueType::Boolean,
        ValueType::Bytes,
        ValueType::Date,
        ValueType::Double,
        ValueType::Integer,
        ValueType::Long,
        ValueType::Null,
        ValueType::Short,
        ValueType::String,
        ValueType::Object,
    ];

    /// Canonical name, used as serializer name and as the wire type name
    /// (after casing conversion at the REST boundary).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Bytes => "bytes",
            Self::Date => "date",
            Self::Double => "double",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Null => "null",
            Self::Short => "short",
            Self::String => "string",
            Self::Object => "object",
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Object)
    }

    /// Serializable kinds are stored as a blob plus metadata.
    pub fn is_serializable(&self) -> bool {
        matches!(self, Self::Object)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolves a [`ValueType`] by its canonical name.
///
/// Populated once at construction with all built-in kinds; read-only after
/// that. An unknown name resolves to `None` so the caller can report a
/// request error instead of crashing.
#[derive(Debug)]
pub struct ValueTypeResolver {
    known_types: HashMap<&'static str, ValueType>,
}

impl ValueTypeResolver {
    pub fn new() -> Self {
        let mut known_types = HashMap::new();
        for value_type in ValueType::ALL {
            known_types.insert(value_type.name(), value_type);
        }
        Self { known_types }
    }

    pub fn type_for_name(&self, name: &str) -> Option<ValueType> {
        self.known_types.get(name).copied()
    }
}

impl Default for ValueTypeResolver {
    fn default() -> Self {
        Self::new()
    }
}
