// ============================================================================
// VarCache Library
// ============================================================================
//
// Per-command unit-of-work entity cache and typed-value persistence engine.
// A command context tracks every entity touched by one transactional unit of
// work through a strict lifecycle state machine, while a pluggable serializer
// registry converts typed variable values (primitives, byte blobs, and live
// objects in JSON or MessagePack) to and from a small set of flat storage
// fields.
// ============================================================================

pub mod cache;
pub mod command;
pub mod config;
pub mod core;
pub mod entity;
pub mod persistence;
pub mod serializer;
pub mod value;
pub mod wire;

// Re-export main types for convenience
pub use crate::cache::{CacheKeyMapping, DbEntity, DbEntityCache, DbEntityState};
pub use crate::command::CommandContext;
pub use crate::config::EngineConfiguration;
pub use crate::core::{EngineError, ErrorKind, Result};
pub use crate::entity::{ByteArrayEntity, VariableInstanceEntity};
pub use crate::persistence::{InMemorySession, PersistenceSession};
pub use crate::serializer::{TypedValueSerializer, ValueFields, VariableSerializers};
pub use crate::value::{ObjectTypeRegistry, ObjectValue, TypedValue, ValueType, ValueTypeResolver};
pub use crate::wire::VariableValueEnvelope;
