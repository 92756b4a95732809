// ============================================================================
// Erased Object Model
// ============================================================================
//
// Object values carry arbitrary application types. The engine never inspects
// them structurally; it only needs three capabilities from a live object:
//
// - a runtime type name (persisted so the object can be reconstructed later)
// - conversion to a neutral document tree that any serialization format can
//   encode (the formats themselves are byte-level codecs over this tree)
// - `Any`-based downcasting so application code can get its concrete type back
//
// Reconstruction goes the other way through an explicit type registry: the
// stored type name selects a decoder. An unregistered name fails the
// deserializing read; the raw bytes stay reachable through the
// non-deserializing read path.
// ============================================================================

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Neutral encode tree shared by all serialization formats.
pub type Document = serde_json::Value;

/// A live (deserialized) object associated with a variable.
///
/// Shared and interiorly mutable: callers may mutate a retrieved object in
/// place and rely on flush-time dirty-checking to persist the change. The
/// engine is command-confined and single-threaded, so `Rc<RefCell<..>>`
/// suffices.
pub type SharedObject = Rc<RefCell<Box<dyn ObjectLike>>>;

#[derive(Error, Debug)]
pub enum ObjectModelError {
    #[error("object type '{0}' is not registered")]
    UnregisteredType(String),

    #[error("{0}")]
    Codec(#[from] serde_json::Error),
}

/// Capabilities the engine requires from a live object value.
///
/// Blanket-implemented for every `Serialize + Any + Debug` type; application
/// code never implements this by hand.
pub trait ObjectLike: Any + Debug {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Encode into the neutral document tree.
    fn to_document(&self) -> Result<Document, serde_json::Error>;

    /// Short runtime type name, derivable when not explicitly declared.
    fn object_type_name(&self) -> String;
}

impl<T> ObjectLike for T
where
    T: Serialize + Any + Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn to_document(&self) -> Result<Document, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn object_type_name(&self) -> String {
        short_type_name(std::any::type_name::<T>()).to_string()
    }
}

/// Wrap a value into a [`SharedObject`].
pub fn share_object<T>(value: T) -> SharedObject
where
    T: ObjectLike + 'static,
{
    Rc::new(RefCell::new(Box::new(value) as Box<dyn ObjectLike>))
}

/// Strips path segments from a fully qualified Rust type name:
/// `my_app::model::SimpleBean` becomes `SimpleBean`.
pub fn short_type_name(full_name: &str) -> &str {
    full_name.rsplit("::").next().unwrap_or(full_name)
}

type DecodeFn = Box<dyn Fn(Document) -> Result<Box<dyn ObjectLike>, serde_json::Error>>;

/// Explicit `type name -> decoder` table used to reconstruct live objects
/// from their stored documents.
///
/// Built once at engine configuration time; decode of a type name that was
/// never registered is a deserialization failure for that read.
pub struct ObjectTypeRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl ObjectTypeRegistry {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register `T` under its derived short type name.
    pub fn register<T>(&mut self)
    where
        T: Serialize + DeserializeOwned + Any + Debug + 'static,
    {
        let name = short_type_name(std::any::type_name::<T>()).to_string();
        self.register_as::<T>(&name);
    }

    /// Register `T` under an explicit type name.
    pub fn register_as<T>(&mut self, name: &str)
    where
        T: Serialize + DeserializeOwned + Any + Debug + 'static,
    {
        self.decoders.insert(
            name.to_string(),
            Box::new(|document| {
                let value: T = serde_json::from_value(document)?;
                Ok(Box::new(value) as Box<dyn ObjectLike>)
            }),
        );
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Reconstruct a live object of the named type from its document.
    pub fn instantiate(
        &self,
        type_name: &str,
        document: Document,
    ) -> Result<SharedObject, ObjectModelError> {
        let decoder = self
            .decoders
            .get(type_name)
            .ok_or_else(|| ObjectModelError::UnregisteredType(type_name.to_string()))?;
        let object = decoder(document)?;
        Ok(Rc::new(RefCell::new(object)))
    }
}

impl Default for ObjectTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ObjectTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ObjectTypeRegistry")
            .field("types", &names)
            .finish()
    }
}
