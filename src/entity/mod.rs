// ============================================================================
// Persistent Entities
// ============================================================================

mod byte_array;
mod variable;

pub use byte_array::ByteArrayEntity;
pub use variable::VariableInstanceEntity;
