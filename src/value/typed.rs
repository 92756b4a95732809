use std::fmt;

use chrono::{DateTime, Utc};

use crate::core::{EngineError, Result};
use crate::value::object::{Document, ObjectLike, SharedObject};
use crate::value::types::ValueType;

/// A value tagged with its [`ValueType`].
///
/// Primitive variants carry `Option<scalar>`; `None` is a typed null (the
/// variable keeps its kind but holds no value). `Null` is the dedicated null
/// kind. `Untyped` carries a raw live value whose kind has not been declared
/// yet; serializer resolution infers the kind on write.
#[derive(Debug, Clone)]
pub enum TypedValue {
    Null,
    Boolean(Option<bool>),
    Bytes(Option<Vec<u8>>),
    Date(Option<DateTime<Utc>>),
    Double(Option<f64>),
    Integer(Option<i32>),
    Long(Option<i64>),
    Short(Option<i16>),
    String(Option<String>),
    Object(ObjectValue),
    Untyped(Option<SharedObject>),
}

impl TypedValue {
    /// The declared kind, or `None` for untyped values.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Null => Some(ValueType::Null),
            Self::Boolean(_) => Some(ValueType::Boolean),
            Self::Bytes(_) => Some(ValueType::Bytes),
            Self::Date(_) => Some(ValueType::Date),
            Self::Double(_) => Some(ValueType::Double),
            Self::Integer(_) => Some(ValueType::Integer),
            Self::Long(_) => Some(ValueType::Long),
            Self::Short(_) => Some(ValueType::Short),
            Self::String(_) => Some(ValueType::String),
            Self::Object(_) => Some(ValueType::Object),
            Self::Untyped(_) => None,
        }
    }

    pub fn untyped(object: Option<SharedObject>) -> Self {
        Self::Untyped(object)
    }

    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Boolean(v) => v.is_none(),
            Self::Bytes(v) => v.is_none(),
            Self::Date(v) => v.is_none(),
            Self::Double(v) => v.is_none(),
            Self::Integer(v) => v.is_none(),
            Self::Long(v) => v.is_none(),
            Self::Short(v) => v.is_none(),
            Self::String(v) => v.is_none(),
            Self::Object(v) => v.is_null(),
            Self::Untyped(v) => v.is_none(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => *v,
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => *v,
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(v) => *v,
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Self::Short(v) => *v,
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => *v,
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => v.as_deref(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(v) => *v,
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Boolean(Some(v))
    }
}

impl From<i16> for TypedValue {
    fn from(v: i16) -> Self {
        Self::Short(Some(v))
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        Self::Integer(Some(v))
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        Self::Long(Some(v))
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        Self::Double(Some(v))
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::String(Some(v))
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::String(Some(v.to_string()))
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Some(v))
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(Some(v))
    }
}

impl From<ObjectValue> for TypedValue {
    fn from(v: ObjectValue) -> Self {
        Self::Object(v)
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Untyped(a), Self::Untyped(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => documents_equal(a, b),
                _ => false,
            },
            _ => false,
        }
    }
}

fn documents_equal(a: &SharedObject, b: &SharedObject) -> bool {
    match (a.borrow().to_document(), b.borrow().to_document()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Serialized/deserialized duality of an object value.
#[derive(Debug, Clone)]
pub enum ObjectState {
    /// A live object is attached (possibly a null one).
    Deserialized(Option<SharedObject>),
    /// Only the byte payload is known; the live value must not be read.
    Serialized,
}

/// Value of the serializable `object` kind.
///
/// Carries a live object, a byte payload, or both, plus the metadata needed
/// to reconstruct the object: its type name and the serialization format the
/// bytes are encoded in.
#[derive(Debug, Clone)]
pub struct ObjectValue {
    state: ObjectState,
    object_type_name: Option<String>,
    serialization_format: Option<String>,
    serialized: Option<Vec<u8>>,
}

impl ObjectValue {
    pub fn new(
        object: Option<SharedObject>,
        serialized: Option<Vec<u8>>,
        serialization_format: Option<String>,
        object_type_name: Option<String>,
        is_deserialized: bool,
    ) -> Self {
        let state = if is_deserialized {
            ObjectState::Deserialized(object)
        } else {
            ObjectState::Serialized
        };
        Self {
            state,
            object_type_name,
            serialization_format,
            serialized,
        }
    }

    /// A deserialized object value holding a live object.
    pub fn deserialized(object: SharedObject) -> Self {
        Self::new(Some(object), None, None, None, true)
    }

    /// A deserialized object value holding no object (typed null).
    pub fn deserialized_null() -> Self {
        Self::new(None, None, None, None, true)
    }

    /// A serialized-only object value; the live object is unavailable.
    pub fn serialized(
        serialized: Option<Vec<u8>>,
        serialization_format: impl Into<String>,
        object_type_name: Option<String>,
    ) -> Self {
        Self::new(
            None,
            serialized,
            Some(serialization_format.into()),
            object_type_name,
            false,
        )
    }

    /// Request a specific serialization format for this value.
    pub fn with_serialization_format(mut self, format: impl Into<String>) -> Self {
        self.serialization_format = Some(format.into());
        self
    }

    /// Declare the object type name explicitly instead of deriving it.
    pub fn with_object_type_name(mut self, name: impl Into<String>) -> Self {
        self.object_type_name = Some(name.into());
        self
    }

    pub fn is_deserialized(&self) -> bool {
        matches!(self.state, ObjectState::Deserialized(_))
    }

    pub fn is_null(&self) -> bool {
        match &self.state {
            ObjectState::Deserialized(object) => object.is_none(),
            ObjectState::Serialized => self.serialized.is_none(),
        }
    }

    /// The live object.
    ///
    /// Fails with `IllegalAccess` when this value is serialized-only;
    /// reading an unavailable object is misuse, not missing data.
    pub fn get_object(&self) -> Result<Option<&SharedObject>> {
        match &self.state {
            ObjectState::Deserialized(object) => Ok(object.as_ref()),
            ObjectState::Serialized => Err(EngineError::IllegalAccess(
                "object is not deserialized".to_string(),
            )),
        }
    }

    pub fn object_type_name(&self) -> Option<&str> {
        self.object_type_name.as_deref()
    }

    pub fn serialization_format(&self) -> Option<&str> {
        self.serialization_format.as_deref()
    }

    /// Byte payload; available in both states.
    pub fn serialized_bytes(&self) -> Option<&[u8]> {
        self.serialized.as_deref()
    }

    /// The live object's document, for comparisons and wire conversion.
    pub fn to_document(&self) -> Result<Option<Document>> {
        match self.get_object()? {
            Some(object) => {
                let document = object.borrow().to_document().map_err(|e| {
                    EngineError::SerializationFailed {
                        variable: self.object_type_name.clone().unwrap_or_default(),
                        cause: e.to_string(),
                    }
                })?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn set_serialized(&mut self, serialized: Option<Vec<u8>>) {
        self.serialized = serialized;
    }

    pub(crate) fn set_serialization_format(&mut self, format: impl Into<String>) {
        self.serialization_format = Some(format.into());
    }

    pub(crate) fn set_object_type_name(&mut self, name: Option<String>) {
        self.object_type_name = name;
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        if self.is_deserialized() != other.is_deserialized()
            || self.object_type_name != other.object_type_name
            || self.serialization_format != other.serialization_format
        {
            return false;
        }
        if self.serialized.is_some() || other.serialized.is_some() {
            return self.serialized == other.serialized;
        }
        match (&self.state, &other.state) {
            (ObjectState::Deserialized(Some(a)), ObjectState::Deserialized(Some(b))) => {
                documents_equal(a, b)
            }
            (ObjectState::Deserialized(None), ObjectState::Deserialized(None)) => true,
            (ObjectState::Serialized, ObjectState::Serialized) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value_type() {
            Some(value_type) => {
                if self.is_null() {
                    write!(f, "{}(null)", value_type)
                } else {
                    write!(f, "{}(..)", value_type)
                }
            }
            None => write!(f, "untyped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::value::object::share_object;

    #[test]
    fn test_from_impls_pick_the_right_kind() {
        assert_eq!(TypedValue::from(true).value_type(), Some(ValueType::Boolean));
        assert_eq!(TypedValue::from(1i16).value_type(), Some(ValueType::Short));
        assert_eq!(TypedValue::from(1i32).value_type(), Some(ValueType::Integer));
        assert_eq!(TypedValue::from(1i64).value_type(), Some(ValueType::Long));
        assert_eq!(TypedValue::from(1.0f64).value_type(), Some(ValueType::Double));
        assert_eq!(TypedValue::from("x").value_type(), Some(ValueType::String));
        assert_eq!(
            TypedValue::from(vec![1u8, 2]).value_type(),
            Some(ValueType::Bytes)
        );
    }

    #[test]
    fn test_typed_null_is_null_but_keeps_its_kind() {
        let value = TypedValue::Integer(None);
        assert!(value.is_null());
        assert_eq!(value.value_type(), Some(ValueType::Integer));
    }

    #[test]
    fn test_reading_serialized_object_is_illegal_access() {
        let value = ObjectValue::serialized(Some(b"{}".to_vec()), "json", Some("X".into()));
        let err = value.get_object().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalAccess);
    }

    #[test]
    fn test_deserialized_object_is_readable() {
        let value = ObjectValue::deserialized(share_object(7i32));
        let object = value.get_object().unwrap().unwrap().clone();
        assert_eq!(*object.borrow().as_any().downcast_ref::<i32>().unwrap(), 7);
    }

    #[test]
    fn test_object_equality_prefers_bytes() {
        let a = ObjectValue::serialized(Some(b"abc".to_vec()), "json", Some("X".into()));
        let b = ObjectValue::serialized(Some(b"abc".to_vec()), "json", Some("X".into()));
        let c = ObjectValue::serialized(Some(b"abd".to_vec()), "json", Some("X".into()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
