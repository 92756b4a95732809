use std::sync::Arc;

use log::warn;
use serde_json::{json, Map};
use uuid::Uuid;

use crate::cache::DbEntity;
use crate::command::CommandContext;
use crate::core::{EngineError, Result};
use crate::serializer::{TypedValueSerializer, ValueFields};
use crate::value::{Document, TypedValue, ValueType};

/// The persistent entity owning one variable: its name, scope identifiers,
/// flat value fields and the serializer association.
///
/// Value access is memoizing: a successfully decoded typed value is cached
/// for the life of the in-memory instance. A failed decode is sticky: the
/// error message is recorded and the deserializing read path short-circuits
/// to `None` instead of re-attempting, while the non-deserializing path
/// keeps working so the raw bytes stay recoverable.
#[derive(Debug)]
pub struct VariableInstanceEntity {
    id: String,
    name: String,

    process_instance_id: Option<String>,
    execution_id: Option<String>,
    task_id: Option<String>,
    case_instance_id: Option<String>,
    case_execution_id: Option<String>,
    activity_instance_id: Option<String>,

    long_value: Option<i64>,
    double_value: Option<f64>,
    text_value: Option<String>,
    text_value2: Option<String>,
    byte_array_id: Option<String>,
    data_format_id: Option<String>,

    serializer_name: Option<String>,
    cached_value: Option<TypedValue>,
    error_message: Option<String>,
}

impl VariableInstanceEntity {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            process_instance_id: None,
            execution_id: None,
            task_id: None,
            case_instance_id: None,
            case_execution_id: None,
            activity_instance_id: None,
            long_value: None,
            double_value: None,
            text_value: None,
            text_value2: None,
            byte_array_id: None,
            data_format_id: None,
            serializer_name: None,
            cached_value: None,
            error_message: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a new value.
    ///
    /// Reuses the currently associated serializer when it still accepts the
    /// value; this keeps the storage format stable across repeated writes of
    /// compatible values. Only when the current serializer rejects the value
    /// is a fresh registry scan done, and only then are the old value fields
    /// cleared before the new serializer writes.
    pub fn set_value(&mut self, value: TypedValue, ctx: &mut CommandContext) -> Result<TypedValue> {
        let mut serializer: Option<Arc<dyn TypedValueSerializer>> = None;

        if let Some(current_name) = self.serializer_name.clone() {
            let current = ctx
                .serializers()
                .serializer_by_name(&current_name)
                .ok_or(EngineError::UnknownSerializer(current_name))?;
            if current.can_handle(&value) {
                serializer = Some(current);
            }
        }

        let serializer = match serializer {
            Some(serializer) => serializer,
            None => {
                let serializer = ctx.serializers().find_serializer_for(&value)?;
                self.serializer_name = Some(serializer.name().to_string());
                // serializer changed: clear leftover fields of the old shape
                self.clear_value_fields(ctx)?;
                serializer
            }
        };

        let value = match &value {
            TypedValue::Untyped(_) => serializer.convert_to_typed(&value)?,
            _ => value,
        };

        let written = serializer.write_value(value, self, ctx)?;
        self.cached_value = Some(written.clone());
        Ok(written)
    }

    /// The typed value of this variable.
    ///
    /// With `deserialize == true` the object payload (if any) is decoded;
    /// a decode failure is captured on this instance and `None` is returned,
    /// also on every subsequent call. With `deserialize == false` the value
    /// is reconstructed from the stored fields only and remains available
    /// regardless of decode failures.
    pub fn get_typed_value(
        &mut self,
        deserialize: bool,
        ctx: &mut CommandContext,
    ) -> Result<Option<TypedValue>> {
        if deserialize && self.error_message.is_some() {
            return Ok(None);
        }

        if let Some(cached) = &self.cached_value {
            let needs_upgrade = matches!(
                cached,
                TypedValue::Object(object_value) if deserialize && !object_value.is_deserialized()
            );
            if !needs_upgrade {
                return Ok(Some(cached.clone()));
            }
        }

        let serializer_name = match &self.serializer_name {
            Some(name) => name.clone(),
            None => return Ok(None),
        };
        let serializer = ctx
            .serializers()
            .serializer_by_name(&serializer_name)
            .ok_or(EngineError::UnknownSerializer(serializer_name))?;

        match serializer.read_value(self, deserialize, ctx) {
            Ok(value) => {
                self.cached_value = Some(value.clone());
                Ok(Some(value))
            }
            Err(e) => {
                if deserialize {
                    warn!("cannot decode value of variable '{}': {}", self.name, e);
                    self.error_message = Some(e.to_string());
                    Ok(None)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// The deserialized value, or `None` when the value is null or cannot
    /// be decoded.
    pub fn get_value(&mut self, ctx: &mut CommandContext) -> Result<Option<TypedValue>> {
        match self.get_typed_value(true, ctx)? {
            Some(value) if !value.is_null() => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Clear all value fields, releasing any blob.
    pub fn clear_value_fields(&mut self, ctx: &mut CommandContext) -> Result<()> {
        self.long_value = None;
        self.double_value = None;
        self.text_value = None;
        self.text_value2 = None;
        self.data_format_id = None;

        if let Some(byte_array_id) = self.byte_array_id.take() {
            ctx.delete_byte_array(&byte_array_id)?;
        }
        Ok(())
    }

    /// Canonical name of this variable's value kind; the null kind when no
    /// value was ever set.
    pub fn type_name(&self, ctx: &CommandContext) -> Result<&'static str> {
        match &self.serializer_name {
            None => Ok(ValueType::Null.name()),
            Some(name) => {
                let serializer = ctx
                    .serializers()
                    .serializer_by_name(name)
                    .ok_or_else(|| EngineError::UnknownSerializer(name.clone()))?;
                Ok(serializer.value_type().name())
            }
        }
    }

    pub fn serializer_name(&self) -> Option<&str> {
        self.serializer_name.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn cached_value(&self) -> Option<&TypedValue> {
        self.cached_value.as_ref()
    }

    pub(crate) fn cached_value_mut(&mut self) -> Option<&mut TypedValue> {
        self.cached_value.as_mut()
    }

    // scope identifiers //////////////////////////////////////////////////

    pub fn process_instance_id(&self) -> Option<&str> {
        self.process_instance_id.as_deref()
    }

    pub fn set_process_instance_id(&mut self, id: Option<String>) {
        self.process_instance_id = id;
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    pub fn set_execution_id(&mut self, id: Option<String>) {
        self.execution_id = id;
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn set_task_id(&mut self, id: Option<String>) {
        self.task_id = id;
    }

    pub fn case_instance_id(&self) -> Option<&str> {
        self.case_instance_id.as_deref()
    }

    pub fn set_case_instance_id(&mut self, id: Option<String>) {
        self.case_instance_id = id;
    }

    pub fn case_execution_id(&self) -> Option<&str> {
        self.case_execution_id.as_deref()
    }

    pub fn set_case_execution_id(&mut self, id: Option<String>) {
        self.case_execution_id = id;
    }

    pub fn activity_instance_id(&self) -> Option<&str> {
        self.activity_instance_id.as_deref()
    }

    pub fn set_activity_instance_id(&mut self, id: Option<String>) {
        self.activity_instance_id = id;
    }

    /// The scope this variable belongs to: task, else execution, else case
    /// execution.
    pub fn variable_scope_id(&self) -> Option<&str> {
        self.task_id
            .as_deref()
            .or(self.execution_id.as_deref())
            .or(self.case_execution_id.as_deref())
    }
}

impl ValueFields for VariableInstanceEntity {
    fn variable_name(&self) -> &str {
        &self.name
    }

    fn long_value(&self) -> Option<i64> {
        self.long_value
    }

    fn set_long_value(&mut self, value: Option<i64>) {
        self.long_value = value;
    }

    fn double_value(&self) -> Option<f64> {
        self.double_value
    }

    fn set_double_value(&mut self, value: Option<f64>) {
        self.double_value = value;
    }

    fn text_value(&self) -> Option<&str> {
        self.text_value.as_deref()
    }

    fn set_text_value(&mut self, value: Option<String>) {
        self.text_value = value;
    }

    fn text_value2(&self) -> Option<&str> {
        self.text_value2.as_deref()
    }

    fn set_text_value2(&mut self, value: Option<String>) {
        self.text_value2 = value;
    }

    fn byte_array_id(&self) -> Option<&str> {
        self.byte_array_id.as_deref()
    }

    fn set_byte_array_id(&mut self, id: Option<String>) {
        self.byte_array_id = id;
    }

    fn data_format_id(&self) -> Option<&str> {
        self.data_format_id.as_deref()
    }

    fn set_data_format_id(&mut self, id: Option<String>) {
        self.data_format_id = id;
    }

    fn dirty_check_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

impl DbEntity for VariableInstanceEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn persistent_state(&self) -> Document {
        let mut state = Map::new();
        if let Some(serializer_name) = &self.serializer_name {
            state.insert("serializerName".into(), json!(serializer_name));
        }
        if let Some(long_value) = self.long_value {
            state.insert("longValue".into(), json!(long_value));
        }
        if let Some(double_value) = self.double_value {
            state.insert("doubleValue".into(), json!(double_value));
        }
        if let Some(text_value) = &self.text_value {
            state.insert("textValue".into(), json!(text_value));
        }
        if let Some(text_value2) = &self.text_value2 {
            state.insert("textValue2".into(), json!(text_value2));
        }
        if let Some(byte_array_id) = &self.byte_array_id {
            state.insert("byteArrayId".into(), json!(byte_array_id));
        }
        if let Some(data_format_id) = &self.data_format_id {
            state.insert("dataFormatId".into(), json!(data_format_id));
        }
        Document::Object(state)
    }
}
