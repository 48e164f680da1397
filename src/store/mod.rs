//! Typed in-memory stores
//!
//! Each store owns one map behind one lock and applies lazy expiration on
//! every access. The stores know nothing about each other; cross-type key
//! uniqueness is the cache's job.

mod entry;
mod value;
mod memory;
mod shared;
mod range;

mod strings;
mod lists;
mod hashes;
mod sets;
mod zsets;

pub use entry::Entry;
pub use value::Value;
pub use memory::{ExpiringMap, Peek, StoreStats, Ttl};
pub use shared::{KeyStore, SharedMap, TypedStore};

pub use strings::StringStore;
pub use lists::ListStore;
pub use hashes::HashStore;
pub use sets::SetStore;
pub use zsets::{SortedSet, SortedSetStore};

use serde::Serialize;
use std::fmt;

/// Which typed store a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    List,
    Hash,
    Set,
    #[serde(rename = "zset")]
    SortedSet,
}

impl KeyType {
    /// Every store, in a fixed order
    pub const ALL: [KeyType; 5] = [
        KeyType::String,
        KeyType::List,
        KeyType::Hash,
        KeyType::Set,
        KeyType::SortedSet,
    ];

    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Hash => "hash",
            KeyType::Set => "set",
            KeyType::SortedSet => "zset",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
