//! FerrumCache - an embedded, in-process multi-type cache
//!
//! - `store`: the five typed stores and their shared expiration machinery
//! - `cache`: the facade routing each key to the store that owns it
//! - `sweeper`: the background task reclaiming expired entries
//! - `config`: tunables for the above

pub mod config;
pub mod error;
pub mod store;
pub mod cache;
pub mod sweeper;

/// Re-export commonly used types
pub use cache::{Cache, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use store::{KeyType, StoreStats, Ttl, Value};
pub use sweeper::Sweeper;
