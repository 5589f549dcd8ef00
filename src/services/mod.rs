// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, CachedProfileStore};
pub use memory::InMemoryProfileStore;
pub use postgres::PostgresProfileStore;
pub use store::{ProfileStore, StoreError};
