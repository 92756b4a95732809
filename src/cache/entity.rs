use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::cache::state::DbEntityState;
use crate::value::Document;

/// A persistable domain object identified by `(type, id)`.
pub trait DbEntity: Any + Debug {
    fn id(&self) -> &str;

    /// Snapshot of the persistable fields, used for flush-time diffing.
    fn persistent_state(&self) -> Document;
}

/// Shared view on a cached entity that retains both the concrete type (for
/// downcasting) and the `DbEntity` trait view (for id and state access).
#[derive(Clone)]
pub struct EntityHandle {
    cell: Rc<dyn Any>,
    entity: Rc<RefCell<dyn DbEntity>>,
    type_id: TypeId,
    type_name: &'static str,
}

impl EntityHandle {
    pub fn new<T: DbEntity>(entity: Rc<RefCell<T>>) -> Self {
        Self {
            cell: entity.clone() as Rc<dyn Any>,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            entity,
        }
    }

    pub fn id(&self) -> String {
        self.entity.borrow().id().to_string()
    }

    /// Runtime type of the wrapped entity (not the cache key).
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_type<T: DbEntity>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast<T: DbEntity>(&self) -> Option<Rc<RefCell<T>>> {
        self.cell.clone().downcast::<RefCell<T>>().ok()
    }

    pub fn entity(&self) -> &Rc<RefCell<dyn DbEntity>> {
        &self.entity
    }

    pub fn persistent_state(&self) -> Document {
        self.entity.borrow().persistent_state()
    }
}

impl Debug for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHandle")
            .field("type", &self.type_name)
            .field("id", &self.id())
            .finish()
    }
}

/// A cache entry: the entity handle, its lifecycle state and, for entities
/// inserted as persistent, the state snapshot taken at insertion time.
#[derive(Debug, Clone)]
pub struct CachedDbEntity {
    handle: EntityHandle,
    state: DbEntityState,
    snapshot: Option<Document>,
}

impl CachedDbEntity {
    pub fn new(handle: EntityHandle, state: DbEntityState) -> Self {
        Self {
            handle,
            state,
            snapshot: None,
        }
    }

    /// Capture the persistable state for later diffing. Called exactly when
    /// the entity enters the cache as `PERSISTENT`.
    pub fn make_snapshot(&mut self) {
        self.snapshot = Some(self.handle.persistent_state());
    }

    /// Whether the entity's persistable state diverged from the snapshot.
    /// Entities without a snapshot (transient, merged) are always dirty.
    pub fn is_dirty(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => *snapshot != self.handle.persistent_state(),
            None => true,
        }
    }

    pub fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    pub fn state(&self) -> DbEntityState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DbEntityState) {
        self.state = state;
    }
}
