use serde_json::json;
use uuid::Uuid;

use crate::cache::DbEntity;
use crate::value::Document;

/// Addressable blob entity owning a byte payload.
///
/// Payloads are never mutated in place: replacing a variable's value deletes
/// the old blob entity and inserts a new one.
#[derive(Debug, Clone)]
pub struct ByteArrayEntity {
    id: String,
    name: Option<String>,
    bytes: Vec<u8>,
}

impl ByteArrayEntity {
    pub fn new(name: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            bytes,
        }
    }

    /// An id-only reference to a blob known to exist but not loaded in this
    /// command; used to mark it deleted without fetching it.
    pub fn reference(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            bytes: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl DbEntity for ByteArrayEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn persistent_state(&self) -> Document {
        json!({
            "name": self.name,
            "bytes": self.bytes,
        })
    }
}
