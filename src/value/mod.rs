mod object;
mod typed;
mod types;

pub use object::{
    share_object, short_type_name, Document, ObjectLike, ObjectModelError, ObjectTypeRegistry,
    SharedObject,
};
pub use typed::{ObjectState, ObjectValue, TypedValue};
pub use types::{ValueType, ValueTypeResolver};
