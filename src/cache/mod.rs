mod cache;
mod entity;
mod key;
mod state;

pub use cache::DbEntityCache;
pub use entity::{CachedDbEntity, DbEntity, EntityHandle};
pub use key::CacheKeyMapping;
pub use state::DbEntityState;
