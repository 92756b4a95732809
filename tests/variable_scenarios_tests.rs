// ============================================================================
// Variable Instance Scenario Tests
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use varcache::value::{share_object, ObjectLike, ObjectValue};
use varcache::{
    ByteArrayEntity, CommandContext, EngineConfiguration, EngineError, InMemorySession,
    ObjectTypeRegistry, TypedValue, ValueFields, VariableInstanceEntity,
};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct SimpleBean {
    s: String,
    n: i32,
    b: bool,
}

fn sample_bean() -> SimpleBean {
    SimpleBean {
        s: "a String".to_string(),
        n: 42,
        b: true,
    }
}

fn context() -> CommandContext {
    let mut object_types = ObjectTypeRegistry::new();
    object_types.register::<SimpleBean>();
    CommandContext::new(
        Arc::new(EngineConfiguration::new(object_types)),
        Rc::new(RefCell::new(InMemorySession::new())),
    )
}

fn read_blob(ctx: &mut CommandContext, variable: &Rc<RefCell<VariableInstanceEntity>>) -> Vec<u8> {
    let blob_id = variable.borrow().byte_array_id().unwrap().to_string();
    ctx.get_byte_array(&blob_id)
        .unwrap()
        .unwrap()
        .borrow()
        .bytes()
        .to_vec()
}

#[test]
fn test_simple_bean_json_scenario() {
    let mut ctx = context();
    let bean = sample_bean();
    let value = TypedValue::Object(
        ObjectValue::deserialized(share_object(bean.clone())).with_serialization_format("json"),
    );
    let variable = ctx.create_variable("simpleBean", value).unwrap();
    assert_eq!(variable.borrow().name(), "simpleBean");
    assert_eq!(variable.borrow().serializer_name(), Some("object-json"));

    let typed = variable
        .borrow_mut()
        .get_typed_value(true, &mut ctx)
        .unwrap()
        .unwrap();
    let object_value = typed.as_object().unwrap();
    assert_eq!(object_value.serialization_format(), Some("json"));
    assert_eq!(object_value.object_type_name(), Some("SimpleBean"));

    let object = object_value.get_object().unwrap().unwrap();
    let restored = object.borrow();
    assert_eq!(restored.as_any().downcast_ref::<SimpleBean>().unwrap(), &bean);

    // the stored payload is the bean's JSON rendition
    let expected = serde_json::to_vec(&bean).unwrap();
    assert_eq!(object_value.serialized_bytes(), Some(expected.as_slice()));
    assert_eq!(read_blob(&mut ctx, &variable), expected);
}

#[test]
fn test_serialized_write_then_deserializing_read() {
    let mut ctx = context();
    let bean = sample_bean();
    let bytes = serde_json::to_vec(&bean).unwrap();
    let value = TypedValue::Object(ObjectValue::serialized(
        Some(bytes.clone()),
        "json",
        Some("SimpleBean".into()),
    ));
    let variable = ctx.create_variable("simpleBean", value).unwrap();

    // the non-deserializing read exposes the bytes without touching them
    let raw = variable
        .borrow_mut()
        .get_typed_value(false, &mut ctx)
        .unwrap()
        .unwrap();
    let raw = raw.as_object().unwrap();
    assert!(!raw.is_deserialized());
    assert_eq!(raw.serialized_bytes(), Some(bytes.as_slice()));
    assert!(raw.get_object().is_err());

    // the deserializing read reconstructs the bean through the type registry
    let typed = variable
        .borrow_mut()
        .get_typed_value(true, &mut ctx)
        .unwrap()
        .unwrap();
    let object_value = typed.as_object().unwrap();
    assert!(object_value.is_deserialized());
    let object = object_value.get_object().unwrap().unwrap();
    assert_eq!(
        object.borrow().as_any().downcast_ref::<SimpleBean>().unwrap(),
        &bean
    );
}

#[test]
fn test_serialized_write_without_type_name_fails() {
    let mut ctx = context();
    let value = TypedValue::Object(ObjectValue::serialized(
        Some(b"{}".to_vec()),
        "json",
        None,
    ));
    let err = ctx.create_variable("anon", value).unwrap_err();
    assert!(matches!(err, EngineError::MissingTypeName(_)));
}

#[test]
fn test_serialized_null_write_needs_no_type_name() {
    let mut ctx = context();
    let value = TypedValue::Object(ObjectValue::serialized(None, "json", None));
    let variable = ctx.create_variable("nullBean", value).unwrap();

    let typed = variable
        .borrow_mut()
        .get_typed_value(true, &mut ctx)
        .unwrap()
        .unwrap();
    assert!(typed.is_null());
    assert!(variable.borrow_mut().get_value(&mut ctx).unwrap().is_none());
}

#[test]
fn test_dirty_check_flush_persists_in_place_mutation() {
    let mut ctx = context();
    let shared = share_object(sample_bean());
    let value = TypedValue::Object(ObjectValue::deserialized(shared.clone()));
    let variable = ctx.create_variable("bean", value).unwrap();
    assert_eq!(ctx.dirty_object_count(), 1);

    let original_blob = read_blob(&mut ctx, &variable);

    // mutate the live object without calling set_value
    shared
        .borrow_mut()
        .as_any_mut()
        .downcast_mut::<SimpleBean>()
        .unwrap()
        .n = 43;
    ctx.flush_dirty_objects().unwrap();

    let mut mutated = sample_bean();
    mutated.n = 43;
    let expected = serde_json::to_vec(&mutated).unwrap();
    assert_ne!(expected, original_blob);
    assert_eq!(read_blob(&mut ctx, &variable), expected);

    // the cached typed value follows the rewritten payload
    let entity = variable.borrow();
    let cached = entity.cached_value().unwrap().as_object().unwrap();
    assert_eq!(cached.serialized_bytes(), Some(expected.as_slice()));
}

#[test]
fn test_flush_without_mutation_keeps_the_blob() {
    let mut ctx = context();
    let value = TypedValue::Object(ObjectValue::deserialized(share_object(sample_bean())));
    let variable = ctx.create_variable("bean", value).unwrap();
    let blob_id = variable.borrow().byte_array_id().unwrap().to_string();

    ctx.flush_dirty_objects().unwrap();
    assert_eq!(
        variable.borrow().byte_array_id(),
        Some(blob_id.as_str()),
        "unchanged object must not be rewritten"
    );
}

#[test]
fn test_delete_variable_releases_blob_and_marks_deleted() {
    let mut ctx = context();
    let value = TypedValue::Object(ObjectValue::deserialized(share_object(sample_bean())));
    let variable = ctx.create_variable("bean", value).unwrap();
    let blob_id = variable.borrow().byte_array_id().unwrap().to_string();

    ctx.delete_variable(&variable).unwrap();

    assert!(ctx.cache().is_deleted(&*variable.borrow()));
    assert!(ctx.cache().is_deleted(&ByteArrayEntity::reference(&blob_id)));
    let entity = variable.borrow();
    assert_eq!(entity.byte_array_id(), None);
    assert_eq!(entity.text_value2(), None);
    assert_eq!(entity.data_format_id(), None);
}

#[test]
fn test_unregistered_object_type_fails_sticky() {
    let mut ctx = context();
    // valid JSON, but the stored type name has no registered decoder
    let value = TypedValue::Object(ObjectValue::serialized(
        Some(b"{\"x\":1}".to_vec()),
        "json",
        Some("Unregistered".into()),
    ));
    let variable = ctx.create_variable("u", value).unwrap();

    assert!(variable
        .borrow_mut()
        .get_typed_value(true, &mut ctx)
        .unwrap()
        .is_none());
    let entity = variable.borrow();
    let error = entity.error_message().unwrap();
    assert!(error.contains("Unregistered"), "got: {error}");
}

#[test]
fn test_scope_id_resolution_order() {
    let mut variable = VariableInstanceEntity::new("v");
    assert_eq!(variable.variable_scope_id(), None);

    variable.set_case_execution_id(Some("ce1".into()));
    assert_eq!(variable.variable_scope_id(), Some("ce1"));

    variable.set_execution_id(Some("e1".into()));
    assert_eq!(variable.variable_scope_id(), Some("e1"));

    variable.set_task_id(Some("t1".into()));
    assert_eq!(variable.variable_scope_id(), Some("t1"));
}
