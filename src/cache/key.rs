use std::any::TypeId;
use std::collections::HashMap;

/// Maps an entity's runtime type to the canonical type used for bucketing.
///
/// Two reasons this indirection exists: an entity's runtime type may be a
/// specialized subtype of its declared persistent type, and two unrelated
/// entity types may reuse the same id values and must not collide. The
/// mapping is the single point of truth for which bucket an entity lands in.
/// Defaults to identity.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyMapping {
    mapping: HashMap<TypeId, TypeId>,
}

impl CacheKeyMapping {
    /// Identity mapping: every type is its own cache key.
    pub fn empty_mapping() -> Self {
        Self::default()
    }

    /// Bucket entities of type `S` under the cache key of type `K`.
    pub fn map_type<S: 'static, K: 'static>(&mut self) {
        self.mapping.insert(TypeId::of::<S>(), TypeId::of::<K>());
    }

    pub fn cache_key_for(&self, entity_type: TypeId) -> TypeId {
        self.mapping.get(&entity_type).copied().unwrap_or(entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Declared;
    struct Specialized;

    #[test]
    fn test_identity_by_default() {
        let mapping = CacheKeyMapping::empty_mapping();
        assert_eq!(
            mapping.cache_key_for(TypeId::of::<Declared>()),
            TypeId::of::<Declared>()
        );
    }

    #[test]
    fn test_mapped_type_shares_bucket() {
        let mut mapping = CacheKeyMapping::empty_mapping();
        mapping.map_type::<Specialized, Declared>();
        assert_eq!(
            mapping.cache_key_for(TypeId::of::<Specialized>()),
            TypeId::of::<Declared>()
        );
        assert_eq!(
            mapping.cache_key_for(TypeId::of::<Declared>()),
            TypeId::of::<Declared>()
        );
    }
}
