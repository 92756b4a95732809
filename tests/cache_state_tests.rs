// ============================================================================
// Entity Cache State Machine Tests
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use varcache::cache::CacheKeyMapping;
use varcache::value::Document;
use varcache::{DbEntity, DbEntityCache, DbEntityState, EngineError};

#[derive(Debug)]
struct Order {
    id: String,
    total: i64,
}

impl Order {
    fn shared(id: &str, total: i64) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            id: id.to_string(),
            total,
        }))
    }
}

impl DbEntity for Order {
    fn id(&self) -> &str {
        &self.id
    }

    fn persistent_state(&self) -> Document {
        json!({ "total": self.total })
    }
}

#[derive(Debug)]
struct Invoice {
    id: String,
}

impl Invoice {
    fn shared(id: &str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { id: id.to_string() }))
    }
}

impl DbEntity for Invoice {
    fn id(&self) -> &str {
        &self.id
    }

    fn persistent_state(&self) -> Document {
        json!({})
    }
}

fn state_of(cache: &DbEntityCache, id: &str) -> DbEntityState {
    cache.get_cached_entity::<Order>(id).unwrap().state()
}

#[test]
fn test_duplicate_transient_insert_fails() {
    let mut cache = DbEntityCache::new();
    cache.put_transient(&Order::shared("o1", 1)).unwrap();

    let err = cache.put_transient(&Order::shared("o1", 2)).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateInsert { .. }));
}

#[test]
fn test_transient_over_persistent_fails() {
    let mut cache = DbEntityCache::new();
    cache.put_persistent(&Order::shared("o1", 1)).unwrap();

    let err = cache.put_transient(&Order::shared("o1", 2)).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyMarked { .. }));
    assert_eq!(state_of(&cache, "o1"), DbEntityState::Persistent);
}

#[test]
fn test_persistent_replaces_persistent() {
    let mut cache = DbEntityCache::new();
    cache.put_persistent(&Order::shared("o1", 1)).unwrap();

    let replacement = Order::shared("o1", 2);
    cache.put_persistent(&replacement).unwrap();

    let found = cache.get::<Order>("o1").unwrap().unwrap();
    assert!(Rc::ptr_eq(&found, &replacement));
    assert_eq!(state_of(&cache, "o1"), DbEntityState::Persistent);
}

#[test]
fn test_persistent_over_transient_fails() {
    let mut cache = DbEntityCache::new();
    cache.put_transient(&Order::shared("o1", 1)).unwrap();

    let err = cache.put_persistent(&Order::shared("o1", 2)).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyMarked { .. }));
    assert_eq!(state_of(&cache, "o1"), DbEntityState::Transient);
}

#[test]
fn test_merged_replaces_persistent_and_merged() {
    let mut cache = DbEntityCache::new();
    cache.put_persistent(&Order::shared("o1", 1)).unwrap();
    cache.put_merged(&Order::shared("o1", 2)).unwrap();
    assert_eq!(state_of(&cache, "o1"), DbEntityState::Merged);

    cache.put_merged(&Order::shared("o1", 3)).unwrap();
    assert_eq!(state_of(&cache, "o1"), DbEntityState::Merged);
}

#[test]
fn test_merged_over_transient_fails() {
    let mut cache = DbEntityCache::new();
    cache.put_transient(&Order::shared("o1", 1)).unwrap();

    let err = cache.put_merged(&Order::shared("o1", 2)).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyMarked { .. }));
}

#[test]
fn test_set_deleted_transitions() {
    let mut cache = DbEntityCache::new();

    let transient = Order::shared("t", 1);
    cache.put_transient(&transient).unwrap();
    cache.set_deleted(&transient).unwrap();
    assert_eq!(state_of(&cache, "t"), DbEntityState::DeletedTransient);

    let persistent = Order::shared("p", 1);
    cache.put_persistent(&persistent).unwrap();
    cache.set_deleted(&persistent).unwrap();
    assert_eq!(state_of(&cache, "p"), DbEntityState::DeletedPersistent);

    let merged = Order::shared("m", 1);
    cache.put_persistent(&merged).unwrap();
    cache.put_merged(&merged).unwrap();
    cache.set_deleted(&merged).unwrap();
    assert_eq!(state_of(&cache, "m"), DbEntityState::DeletedMerged);
}

#[test]
fn test_set_deleted_without_entry_inserts_deleted_merged() {
    let mut cache = DbEntityCache::new();
    let unloaded = Order::shared("u", 1);
    cache.set_deleted(&unloaded).unwrap();
    assert_eq!(state_of(&cache, "u"), DbEntityState::DeletedMerged);
    assert!(cache.is_deleted(&*unloaded.borrow()));
}

#[test]
fn test_set_deleted_is_idempotent() {
    let mut cache = DbEntityCache::new();
    let order = Order::shared("o1", 1);
    cache.put_persistent(&order).unwrap();
    cache.set_deleted(&order).unwrap();
    cache.set_deleted(&order).unwrap();
    assert_eq!(state_of(&cache, "o1"), DbEntityState::DeletedPersistent);
}

#[test]
fn test_persistent_put_over_deleted_is_ignored() {
    let mut cache = DbEntityCache::new();
    let order = Order::shared("o1", 1);
    cache.put_persistent(&order).unwrap();
    cache.set_deleted(&order).unwrap();

    // silently ignored; the bucket stays deleted
    cache.put_persistent(&Order::shared("o1", 2)).unwrap();
    assert_eq!(state_of(&cache, "o1"), DbEntityState::DeletedPersistent);

    let found = cache.get::<Order>("o1").unwrap().unwrap();
    assert!(Rc::ptr_eq(&found, &order));
}

#[test]
fn test_merged_put_over_deleted_is_ignored() {
    let mut cache = DbEntityCache::new();
    let order = Order::shared("o1", 1);
    cache.put_persistent(&order).unwrap();
    cache.put_merged(&order).unwrap();
    cache.set_deleted(&order).unwrap();

    cache.put_merged(&Order::shared("o1", 2)).unwrap();
    assert_eq!(state_of(&cache, "o1"), DbEntityState::DeletedMerged);
}

#[test]
fn test_transient_put_over_deleted_fails() {
    let mut cache = DbEntityCache::new();
    let order = Order::shared("o1", 1);
    cache.put_transient(&order).unwrap();
    cache.set_deleted(&order).unwrap();

    let err = cache.put_transient(&Order::shared("o1", 2)).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyMarked { .. }));
}

#[test]
fn test_aliased_types_do_not_masquerade_as_each_other() {
    let mut mapping = CacheKeyMapping::empty_mapping();
    mapping.map_type::<Invoice, Order>();
    let mut cache = DbEntityCache::with_key_mapping(mapping);

    // both land in the Order bucket under the same id
    cache.put_transient(&Invoice::shared("1")).unwrap();
    let err = cache.put_transient(&Order::shared("1", 5)).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateInsert { .. }));

    // the cached invoice is not retrievable as an order
    let err = cache.get::<Order>("1").unwrap_err();
    assert!(matches!(err, EngineError::TypeMismatch(_)));
    assert!(cache.get::<Invoice>("1").unwrap().is_some());
}

#[test]
fn test_get_entities_by_type_filters_shared_buckets() {
    let mut mapping = CacheKeyMapping::empty_mapping();
    mapping.map_type::<Invoice, Order>();
    let mut cache = DbEntityCache::with_key_mapping(mapping);

    cache.put_transient(&Invoice::shared("i1")).unwrap();
    cache.put_transient(&Order::shared("o1", 1)).unwrap();
    cache.put_transient(&Order::shared("o2", 2)).unwrap();

    assert_eq!(cache.get_entities_by_type::<Order>().len(), 2);
    assert_eq!(cache.get_entities_by_type::<Invoice>().len(), 1);
    assert_eq!(cache.cached_entities().len(), 3);
}
