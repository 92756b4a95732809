// ============================================================================
// Persistence Session Boundary
// ============================================================================
//
// The durable row store is an external collaborator; this crate only needs
// synchronous, fallible access to blob payloads: insert on flush, select for
// the lazy fetch, delete on value replacement. Everything else (SQL, row
// mapping, optimistic locking) lives behind this trait.
// ============================================================================

use std::collections::HashMap;

use crate::core::Result;
use crate::entity::ByteArrayEntity;

pub trait PersistenceSession {
    fn insert_byte_array(&mut self, entity: &ByteArrayEntity) -> Result<()>;

    fn select_byte_array_by_id(&mut self, id: &str) -> Result<Option<ByteArrayEntity>>;

    fn delete_byte_array_by_id(&mut self, id: &str) -> Result<()>;
}

/// HashMap-backed session, for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemorySession {
    byte_arrays: HashMap<String, ByteArrayEntity>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn byte_array_count(&self) -> usize {
        self.byte_arrays.len()
    }
}

impl PersistenceSession for InMemorySession {
    fn insert_byte_array(&mut self, entity: &ByteArrayEntity) -> Result<()> {
        self.byte_arrays
            .insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    fn select_byte_array_by_id(&mut self, id: &str) -> Result<Option<ByteArrayEntity>> {
        Ok(self.byte_arrays.get(id).cloned())
    }

    fn delete_byte_array_by_id(&mut self, id: &str) -> Result<()> {
        self.byte_arrays.remove(id);
        Ok(())
    }
}
