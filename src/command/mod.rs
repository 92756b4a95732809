// ============================================================================
// Command Context
// ============================================================================
//
// One transactional unit of work. The context owns the first-level entity
// cache and the dirty-object side table; both live and die with the command.
// Aborting a command is dropping its context. The context is confined to a
// single thread; nothing here locks.
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

use crate::cache::DbEntityCache;
use crate::config::EngineConfiguration;
use crate::core::{EngineError, Result};
use crate::entity::{ByteArrayEntity, VariableInstanceEntity};
use crate::persistence::PersistenceSession;
use crate::serializer::{set_byte_array, SerializationFormat, VariableSerializers};
use crate::value::{ObjectLike, SharedObject, TypedValue};

/// A live object handed out by an object serializer, remembered so that
/// in-place mutation can be detected and persisted at flush time.
struct DirtyObjectEntry {
    format: Arc<dyn SerializationFormat>,
    object: SharedObject,
    last_bytes: Vec<u8>,
    variable_id: String,
    variable_name: String,
}

pub struct CommandContext {
    config: Arc<EngineConfiguration>,
    cache: DbEntityCache,
    dirty_objects: Vec<DirtyObjectEntry>,
    session: Rc<RefCell<dyn PersistenceSession>>,
}

impl CommandContext {
    pub fn new(
        config: Arc<EngineConfiguration>,
        session: Rc<RefCell<dyn PersistenceSession>>,
    ) -> Self {
        Self {
            config,
            cache: DbEntityCache::new(),
            dirty_objects: Vec::new(),
            session,
        }
    }

    /// Context with a custom entity cache (e.g. one built with a cache-key
    /// mapping).
    pub fn with_cache(
        config: Arc<EngineConfiguration>,
        session: Rc<RefCell<dyn PersistenceSession>>,
        cache: DbEntityCache,
    ) -> Self {
        Self {
            config,
            cache,
            dirty_objects: Vec::new(),
            session,
        }
    }

    pub fn config(&self) -> &EngineConfiguration {
        &self.config
    }

    pub fn serializers(&self) -> &VariableSerializers {
        self.config.serializers()
    }

    pub fn cache(&self) -> &DbEntityCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DbEntityCache {
        &mut self.cache
    }

    // byte array management //////////////////////////////////////////////

    /// Track a new blob entity in this command. The durable insert happens
    /// at flush time, outside this core.
    pub fn insert_byte_array(&mut self, entity: ByteArrayEntity) -> Result<String> {
        let id = entity.id().to_string();
        let entity = Rc::new(RefCell::new(entity));
        self.cache.put_transient(&entity)?;
        Ok(id)
    }

    /// Mark a blob deleted. The blob is loaded first (if it exists) so a
    /// persistent blob transitions to `DELETED_PERSISTENT` instead of
    /// leaving a stray `DELETED_MERGED` entry.
    pub fn delete_byte_array(&mut self, id: &str) -> Result<()> {
        let entity = match self.get_byte_array(id)? {
            Some(entity) => entity,
            None => Rc::new(RefCell::new(ByteArrayEntity::reference(id))),
        };
        self.cache.set_deleted(&entity)
    }

    /// Resolve a blob within this command: cache first, then a synchronous
    /// read through the persistence session.
    pub fn get_byte_array(&mut self, id: &str) -> Result<Option<Rc<RefCell<ByteArrayEntity>>>> {
        if let Some(entity) = self.cache.get::<ByteArrayEntity>(id)? {
            return Ok(Some(entity));
        }
        match self.session.borrow_mut().select_byte_array_by_id(id)? {
            Some(entity) => {
                let entity = Rc::new(RefCell::new(entity));
                self.cache.put_persistent(&entity)?;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    // variable management ////////////////////////////////////////////////

    /// Create a variable, set its initial value and track it as transient.
    pub fn create_variable(
        &mut self,
        name: &str,
        value: TypedValue,
    ) -> Result<Rc<RefCell<VariableInstanceEntity>>> {
        let mut variable = VariableInstanceEntity::new(name);
        variable.set_value(value, self)?;
        let variable = Rc::new(RefCell::new(variable));
        self.cache.put_transient(&variable)?;
        Ok(variable)
    }

    /// Delete a variable: clear its value fields (releasing any blob) and
    /// mark the entity deleted.
    pub fn delete_variable(
        &mut self,
        variable: &Rc<RefCell<VariableInstanceEntity>>,
    ) -> Result<()> {
        variable.borrow_mut().clear_value_fields(self)?;
        self.cache.set_deleted(variable)
    }

    // dirty checking /////////////////////////////////////////////////////

    pub(crate) fn register_dirty_object(
        &mut self,
        format: Arc<dyn SerializationFormat>,
        object: SharedObject,
        last_bytes: Vec<u8>,
        variable_id: String,
        variable_name: String,
    ) {
        self.dirty_objects.push(DirtyObjectEntry {
            format,
            object,
            last_bytes,
            variable_id,
            variable_name,
        });
    }

    pub fn dirty_object_count(&self) -> usize {
        self.dirty_objects.len()
    }

    /// Re-encode every registered live object and persist the ones whose
    /// bytes changed since they were handed out. Lets callers mutate a
    /// retrieved object in place without an explicit set operation.
    pub fn flush_dirty_objects(&mut self) -> Result<()> {
        let entries = std::mem::take(&mut self.dirty_objects);
        for entry in entries {
            let document = entry.object.borrow().to_document().map_err(|e| {
                EngineError::SerializationFailed {
                    variable: entry.variable_name.clone(),
                    cause: e.to_string(),
                }
            })?;
            let bytes =
                entry
                    .format
                    .encode(&document)
                    .map_err(|e| EngineError::SerializationFailed {
                        variable: entry.variable_name.clone(),
                        cause: e.to_string(),
                    })?;
            if bytes == entry.last_bytes {
                continue;
            }
            debug!(
                "flushing dirty object of variable '{}' ({} bytes)",
                entry.variable_name,
                bytes.len()
            );
            if let Some(variable) = self
                .cache
                .get::<VariableInstanceEntity>(&entry.variable_id)?
            {
                let mut variable = variable.borrow_mut();
                set_byte_array(&mut *variable, Some(bytes.clone()), self)?;
                if let Some(TypedValue::Object(cached)) = variable.cached_value_mut() {
                    cached.set_serialized(Some(bytes));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("cache", &self.cache)
            .field("dirty_objects", &self.dirty_objects.len())
            .finish()
    }
}
