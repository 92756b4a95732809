// ============================================================================
// First-Level Entity Cache
// ============================================================================
//
// Per-command cache of persistable entities, bucketed by cache key (a
// canonical type resolved through CacheKeyMapping) and indexed by id.
// Enforces the entity lifecycle state machine: an entity is tracked exactly
// once per command, and conflicting puts fail instead of silently losing
// state. The two exceptions are PERSISTENT/MERGED puts over an entry that is
// already marked deleted, which are ignored.
// ============================================================================

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace};

use crate::cache::entity::{CachedDbEntity, DbEntity, EntityHandle};
use crate::cache::key::CacheKeyMapping;
use crate::cache::state::DbEntityState;
use crate::core::{EngineError, Result};

#[derive(Debug)]
pub struct DbEntityCache {
    /// Buckets by cache key, each indexed by entity id.
    cached_entities: HashMap<TypeId, HashMap<String, CachedDbEntity>>,
    key_mapping: CacheKeyMapping,
}

impl DbEntityCache {
    pub fn new() -> Self {
        Self::with_key_mapping(CacheKeyMapping::empty_mapping())
    }

    pub fn with_key_mapping(key_mapping: CacheKeyMapping) -> Self {
        Self {
            cached_entities: HashMap::new(),
            key_mapping,
        }
    }

    /// Get an entity from the cache.
    ///
    /// Returns `None` if no entity is cached under the resolved bucket.
    /// Fails with `TypeMismatch` if the cached entity cannot be viewed as
    /// `T`; correct usage never hits this.
    pub fn get<T: DbEntity>(&self, id: &str) -> Result<Option<Rc<RefCell<T>>>> {
        let cache_key = self.key_mapping.cache_key_for(TypeId::of::<T>());
        let cached = self
            .cached_entities
            .get(&cache_key)
            .and_then(|bucket| bucket.get(id));
        match cached {
            Some(cached) => match cached.handle().downcast::<T>() {
                Some(entity) => Ok(Some(entity)),
                None => Err(EngineError::TypeMismatch(format!(
                    "could not lookup entity of type '{}' and id '{}': found entity of type '{}'",
                    std::any::type_name::<T>(),
                    id,
                    cached.handle().type_name()
                ))),
            },
            None => Ok(None),
        }
    }

    /// All cached entities of exactly type `T`.
    ///
    /// When the bucket serves multiple runtime types, only entries whose
    /// runtime type is `T` are returned.
    pub fn get_entities_by_type<T: DbEntity>(&self) -> Vec<Rc<RefCell<T>>> {
        let cache_key = self.key_mapping.cache_key_for(TypeId::of::<T>());
        match self.cached_entities.get(&cache_key) {
            Some(bucket) => bucket
                .values()
                .filter_map(|cached| cached.handle().downcast::<T>())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Lookup the cache entry for an entity.
    pub fn get_cached_entity<T: DbEntity>(&self, id: &str) -> Option<&CachedDbEntity> {
        let cache_key = self.key_mapping.cache_key_for(TypeId::of::<T>());
        self.cached_entities
            .get(&cache_key)
            .and_then(|bucket| bucket.get(id))
    }

    /// Put a new `TRANSIENT` entity into the cache.
    pub fn put_transient<T: DbEntity>(&mut self, entity: &Rc<RefCell<T>>) -> Result<()> {
        let cached = CachedDbEntity::new(EntityHandle::new(entity.clone()), DbEntityState::Transient);
        self.put_internal(cached)
    }

    /// Put a `PERSISTENT` entity into the cache, snapshotting its
    /// persistable state for flush-time diffing.
    pub fn put_persistent<T: DbEntity>(&mut self, entity: &Rc<RefCell<T>>) -> Result<()> {
        let mut cached =
            CachedDbEntity::new(EntityHandle::new(entity.clone()), DbEntityState::Persistent);
        cached.make_snapshot();
        self.put_internal(cached)
    }

    /// Put a `MERGED` entity into the cache. No snapshot: a merged entity is
    /// known dirty.
    pub fn put_merged<T: DbEntity>(&mut self, entity: &Rc<RefCell<T>>) -> Result<()> {
        let cached = CachedDbEntity::new(EntityHandle::new(entity.clone()), DbEntityState::Merged);
        self.put_internal(cached)
    }

    fn put_internal(&mut self, entity_to_add: CachedDbEntity) -> Result<()> {
        let cache_key = self
            .key_mapping
            .cache_key_for(entity_to_add.handle().type_id());
        let id = entity_to_add.handle().id();
        let bucket = self.cached_entities.entry(cache_key).or_default();

        let existing = match bucket.get(&id) {
            Some(existing) => existing,
            None => {
                trace!(
                    "caching {} '{}' as {}",
                    entity_to_add.handle().type_name(),
                    id,
                    entity_to_add.state()
                );
                bucket.insert(id, entity_to_add);
                return Ok(());
            }
        };

        let incoming = entity_to_add.state();
        let existing_state = existing.state();
        match incoming {
            DbEntityState::Transient => {
                if existing_state == DbEntityState::Transient {
                    Err(EngineError::DuplicateInsert {
                        entity_type: entity_to_add.handle().type_name().to_string(),
                        id,
                    })
                } else {
                    Err(already_marked(&entity_to_add, existing_state))
                }
            }
            DbEntityState::Persistent => match existing_state {
                DbEntityState::Persistent => {
                    bucket.insert(id, entity_to_add);
                    Ok(())
                }
                DbEntityState::DeletedPersistent | DbEntityState::DeletedMerged => {
                    // already marked to be deleted; ignore the put
                    debug!(
                        "ignoring PERSISTENT put of {} '{}': entry is {}",
                        entity_to_add.handle().type_name(),
                        id,
                        existing_state
                    );
                    Ok(())
                }
                _ => Err(already_marked(&entity_to_add, existing_state)),
            },
            DbEntityState::Merged => match existing_state {
                DbEntityState::Persistent | DbEntityState::Merged => {
                    bucket.insert(id, entity_to_add);
                    Ok(())
                }
                DbEntityState::DeletedPersistent | DbEntityState::DeletedMerged => {
                    debug!(
                        "ignoring MERGED put of {} '{}': entry is {}",
                        entity_to_add.handle().type_name(),
                        id,
                        existing_state
                    );
                    Ok(())
                }
                _ => Err(already_marked(&entity_to_add, existing_state)),
            },
            // deletes are always added
            _ => {
                bucket.insert(id, entity_to_add);
                Ok(())
            }
        }
    }

    /// Remove an entity from the cache. Returns whether an entry existed.
    pub fn remove<T: DbEntity>(&mut self, entity: &T) -> bool {
        let cache_key = self.key_mapping.cache_key_for(TypeId::of::<T>());
        match self.cached_entities.get_mut(&cache_key) {
            Some(bucket) => bucket.remove(entity.id()).is_some(),
            None => false,
        }
    }

    pub fn contains<T: DbEntity>(&self, entity: &T) -> bool {
        self.get_cached_entity::<T>(entity.id()).is_some()
    }

    pub fn is_persistent<T: DbEntity>(&self, entity: &T) -> bool {
        self.get_cached_entity::<T>(entity.id())
            .map(|cached| cached.state() == DbEntityState::Persistent)
            .unwrap_or(false)
    }

    pub fn is_deleted<T: DbEntity>(&self, entity: &T) -> bool {
        self.get_cached_entity::<T>(entity.id())
            .map(|cached| cached.state().is_deleted())
            .unwrap_or(false)
    }

    pub fn is_transient<T: DbEntity>(&self, entity: &T) -> bool {
        self.get_cached_entity::<T>(entity.id())
            .map(|cached| cached.state() == DbEntityState::Transient)
            .unwrap_or(false)
    }

    /// Transition an entity to its deleted state. The entry stays in the
    /// cache. An entity without an entry is inserted directly as
    /// `DELETED_MERGED`; this covers deleting something not yet loaded in
    /// this command but known to exist.
    pub fn set_deleted<T: DbEntity>(&mut self, entity: &Rc<RefCell<T>>) -> Result<()> {
        let cache_key = self.key_mapping.cache_key_for(TypeId::of::<T>());
        let id = entity.borrow().id().to_string();
        if let Some(cached) = self
            .cached_entities
            .get_mut(&cache_key)
            .and_then(|bucket| bucket.get_mut(&id))
        {
            let next = match cached.state() {
                DbEntityState::Transient => Some(DbEntityState::DeletedTransient),
                DbEntityState::Persistent => Some(DbEntityState::DeletedPersistent),
                DbEntityState::Merged => Some(DbEntityState::DeletedMerged),
                _ => None,
            };
            if let Some(next) = next {
                trace!("marking {} '{}' as {}", cached.handle().type_name(), id, next);
                cached.set_state(next);
            }
            Ok(())
        } else {
            let cached = CachedDbEntity::new(
                EntityHandle::new(entity.clone()),
                DbEntityState::DeletedMerged,
            );
            self.put_internal(cached)
        }
    }

    /// All cache entries, across buckets.
    pub fn cached_entities(&self) -> Vec<&CachedDbEntity> {
        self.cached_entities
            .values()
            .flat_map(|bucket| bucket.values())
            .collect()
    }
}

impl Default for DbEntityCache {
    fn default() -> Self {
        Self::new()
    }
}

fn already_marked(entity_to_add: &CachedDbEntity, existing: DbEntityState) -> EngineError {
    EngineError::AlreadyMarked {
        entity_type: entity_to_add.handle().type_name().to_string(),
        id: entity_to_add.handle().id(),
        incoming: entity_to_add.state().to_string(),
        existing: existing.to_string(),
    }
}
