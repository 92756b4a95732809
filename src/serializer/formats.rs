use thiserror::Error;

use crate::serializer::object::SerializationFormat;
use crate::value::Document;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("{0}")]
    Other(String),
}

/// JSON object format backed by serde_json.
#[derive(Debug, Default)]
pub struct JsonFormat;

impl SerializationFormat for JsonFormat {
    fn format_name(&self) -> &str {
        "json"
    }

    fn encode(&self, document: &Document) -> Result<Vec<u8>, FormatError> {
        Ok(serde_json::to_vec(document)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, FormatError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// MessagePack object format backed by rmp-serde.
#[derive(Debug, Default)]
pub struct MsgpackFormat;

impl SerializationFormat for MsgpackFormat {
    fn format_name(&self) -> &str {
        "msgpack"
    }

    fn encode(&self, document: &Document) -> Result<Vec<u8>, FormatError> {
        Ok(rmp_serde::to_vec(document)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, FormatError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
