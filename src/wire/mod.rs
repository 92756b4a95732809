// ============================================================================
// Wire Envelope
// ============================================================================
//
// The JSON shape exchanged with a REST facade. The facade itself is out of
// scope; this module only converts between the envelope and TypedValue, and
// produces raw binary payloads for download-style endpoints.
// ============================================================================

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::core::{EngineError, Result};
use crate::value::{share_object, ObjectLike, ObjectValue, TypedValue, ValueType, ValueTypeResolver};

pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

const INFO_OBJECT_TYPE_NAME: &str = "objectTypeName";
const INFO_SERIALIZATION_DATA_FORMAT: &str = "serializationDataFormat";

/// One variable value on the wire: `{ "type", "value", "valueInfo" }`.
///
/// Type names travel upper-camel-cased (`"Integer"`, `"Object"`); internally
/// they are lower-cased. The casing conversion happens here and nowhere else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableValueEnvelope {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default)]
    pub value: JsonValue,

    #[serde(
        rename = "valueInfo",
        default,
        skip_serializing_if = "Map::is_empty"
    )]
    pub value_info: Map<String, JsonValue>,
}

/// Lower-case the first character: `"Integer"` -> `"integer"`.
pub fn to_internal_type_name(wire_name: &str) -> String {
    let mut chars = wire_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-case the first character: `"integer"` -> `"Integer"`.
pub fn to_wire_type_name(internal_name: &str) -> String {
    let mut chars = internal_name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl VariableValueEnvelope {
    pub fn untyped(value: JsonValue) -> Self {
        Self {
            value_type: None,
            value,
            value_info: Map::new(),
        }
    }

    pub fn typed(type_name: &str, value: JsonValue) -> Self {
        Self {
            value_type: Some(type_name.to_string()),
            value,
            value_info: Map::new(),
        }
    }

    /// Convert the envelope into a typed value.
    ///
    /// A missing `type` yields an untyped value (kind inference happens at
    /// write time). An unknown type name is a request error. Scalar payloads
    /// tolerate a string rendition of the target type; everything else is a
    /// request error.
    pub fn to_typed_value(&self, resolver: &ValueTypeResolver) -> Result<TypedValue> {
        let type_name = match &self.value_type {
            Some(name) => to_internal_type_name(name),
            None => return Ok(self.to_untyped_value()),
        };
        let value_type = resolver
            .type_for_name(&type_name)
            .ok_or_else(|| EngineError::InvalidRequest(format!("unknown value type '{type_name}'")))?;

        match value_type {
            ValueType::Null => match &self.value {
                JsonValue::Null => Ok(TypedValue::Null),
                other => Err(self.mismatch(value_type, other)),
            },
            ValueType::Boolean => match &self.value {
                JsonValue::Null => Ok(TypedValue::Boolean(None)),
                JsonValue::Bool(v) => Ok(TypedValue::Boolean(Some(*v))),
                JsonValue::String(s) => s
                    .parse::<bool>()
                    .map(|v| TypedValue::Boolean(Some(v)))
                    .map_err(|_| self.mismatch(value_type, &self.value)),
                other => Err(self.mismatch(value_type, other)),
            },
            ValueType::Integer => self
                .coerce_integral(value_type)?
                .map(|v| {
                    i32::try_from(v)
                        .map(|v| TypedValue::Integer(Some(v)))
                        .map_err(|_| self.mismatch(value_type, &self.value))
                })
                .unwrap_or(Ok(TypedValue::Integer(None))),
            ValueType::Long => Ok(match self.coerce_integral(value_type)? {
                Some(v) => TypedValue::Long(Some(v)),
                None => TypedValue::Long(None),
            }),
            ValueType::Short => self
                .coerce_integral(value_type)?
                .map(|v| {
                    i16::try_from(v)
                        .map(|v| TypedValue::Short(Some(v)))
                        .map_err(|_| self.mismatch(value_type, &self.value))
                })
                .unwrap_or(Ok(TypedValue::Short(None))),
            ValueType::Double => match &self.value {
                JsonValue::Null => Ok(TypedValue::Double(None)),
                JsonValue::Number(n) => n
                    .as_f64()
                    .map(|v| TypedValue::Double(Some(v)))
                    .ok_or_else(|| self.mismatch(value_type, &self.value)),
                JsonValue::String(s) => s
                    .parse::<f64>()
                    .map(|v| TypedValue::Double(Some(v)))
                    .map_err(|_| self.mismatch(value_type, &self.value)),
                other => Err(self.mismatch(value_type, other)),
            },
            ValueType::String => match &self.value {
                JsonValue::Null => Ok(TypedValue::String(None)),
                JsonValue::String(s) => Ok(TypedValue::String(Some(s.clone()))),
                other => Err(self.mismatch(value_type, other)),
            },
            ValueType::Date => match &self.value {
                JsonValue::Null => Ok(TypedValue::Date(None)),
                JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
                    .map(|v| TypedValue::Date(Some(v.with_timezone(&Utc))))
                    .map_err(|_| self.mismatch(value_type, &self.value)),
                other => Err(self.mismatch(value_type, other)),
            },
            ValueType::Bytes => match &self.value {
                JsonValue::Null => Ok(TypedValue::Bytes(None)),
                JsonValue::String(s) => BASE64
                    .decode(s)
                    .map(|v| TypedValue::Bytes(Some(v)))
                    .map_err(|_| self.mismatch(value_type, &self.value)),
                other => Err(self.mismatch(value_type, other)),
            },
            ValueType::Object => self.to_object_value(),
        }
    }

    /// Render a typed value as a wire envelope.
    pub fn from_typed_value(value: &TypedValue) -> Result<Self> {
        let type_name = value.value_type().map(|t| to_wire_type_name(t.name()));
        let mut value_info = Map::new();

        let wire_value = match value {
            TypedValue::Null | TypedValue::Untyped(None) => JsonValue::Null,
            TypedValue::Boolean(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            TypedValue::Integer(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            TypedValue::Long(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            TypedValue::Short(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            TypedValue::Double(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            TypedValue::String(v) => v
                .as_ref()
                .map(|s| JsonValue::from(s.clone()))
                .unwrap_or(JsonValue::Null),
            TypedValue::Date(v) => v
                .map(|d| JsonValue::from(d.to_rfc3339()))
                .unwrap_or(JsonValue::Null),
            TypedValue::Bytes(v) => v
                .as_ref()
                .map(|b| JsonValue::from(BASE64.encode(b)))
                .unwrap_or(JsonValue::Null),
            TypedValue::Untyped(Some(object)) => {
                object
                    .borrow()
                    .to_document()
                    .map_err(|e| EngineError::InvalidRequest(e.to_string()))?
            }
            TypedValue::Object(object_value) => {
                if let Some(name) = object_value.object_type_name() {
                    value_info.insert(INFO_OBJECT_TYPE_NAME.into(), JsonValue::from(name));
                }
                if let Some(format) = object_value.serialization_format() {
                    value_info
                        .insert(INFO_SERIALIZATION_DATA_FORMAT.into(), JsonValue::from(format));
                }
                match object_value.serialized_bytes() {
                    None => JsonValue::Null,
                    // text formats travel as the serialized text itself,
                    // binary formats fall back to base64
                    Some(bytes) => match std::str::from_utf8(bytes) {
                        Ok(text) => JsonValue::from(text),
                        Err(_) => JsonValue::from(BASE64.encode(bytes)),
                    },
                }
            }
        };

        Ok(Self {
            value_type: type_name,
            value: wire_value,
            value_info,
        })
    }

    /// The raw byte payload and content type for binary retrieval.
    ///
    /// Only the serializable and raw-bytes kinds have one; any other kind at
    /// this call is a request error.
    pub fn binary_payload(value: &TypedValue) -> Result<(Vec<u8>, String)> {
        match value {
            TypedValue::Bytes(bytes) => Ok((
                bytes.clone().unwrap_or_default(),
                CONTENT_TYPE_OCTET_STREAM.to_string(),
            )),
            TypedValue::Object(object_value) => {
                let content_type = object_value
                    .serialization_format()
                    .unwrap_or(CONTENT_TYPE_OCTET_STREAM)
                    .to_string();
                let bytes = object_value
                    .serialized_bytes()
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default();
                Ok((bytes, content_type))
            }
            other => Err(EngineError::InvalidRequest(format!(
                "value of type {other} has no binary payload"
            ))),
        }
    }

    fn to_untyped_value(&self) -> TypedValue {
        match &self.value {
            JsonValue::Null => TypedValue::Untyped(None),
            JsonValue::Bool(v) => TypedValue::Boolean(Some(*v)),
            JsonValue::Number(n) => {
                if let Some(v) = n.as_i64() {
                    match i32::try_from(v) {
                        Ok(v) => TypedValue::Integer(Some(v)),
                        Err(_) => TypedValue::Long(Some(v)),
                    }
                } else {
                    TypedValue::Double(n.as_f64())
                }
            }
            JsonValue::String(s) => TypedValue::String(Some(s.clone())),
            // structured payloads stay live documents, typed on write
            value => TypedValue::Untyped(Some(share_object(value.clone()))),
        }
    }

    fn to_object_value(&self) -> Result<TypedValue> {
        let serialized = match &self.value {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone().into_bytes()),
            other => return Err(self.mismatch(ValueType::Object, other)),
        };
        let object_type_name = self
            .value_info
            .get(INFO_OBJECT_TYPE_NAME)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let serialization_format = self
            .value_info
            .get(INFO_SERIALIZATION_DATA_FORMAT)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        Ok(TypedValue::Object(ObjectValue::new(
            None,
            serialized,
            serialization_format,
            object_type_name,
            false,
        )))
    }

    fn coerce_integral(&self, value_type: ValueType) -> Result<Option<i64>> {
        match &self.value {
            JsonValue::Null => Ok(None),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.mismatch(value_type, &self.value)),
            JsonValue::String(s) => s
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.mismatch(value_type, &self.value)),
            other => Err(self.mismatch(value_type, other)),
        }
    }

    fn mismatch(&self, value_type: ValueType, value: &JsonValue) -> EngineError {
        EngineError::InvalidRequest(format!(
            "cannot read value '{value}' as type '{value_type}'"
        ))
    }
}
