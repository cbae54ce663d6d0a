mod cache;
mod memory;
mod session;
mod sqlite;

pub use cache::{
    AUTO_SYNC_KEY, AssociationMap, CATEGORIES_KEY, CacheStore, LAST_SYNC_KEY, NOTE_CATEGORIES_KEY,
    NOTES_KEY,
};
pub use memory::MemoryStore;
pub use session::{
    SESSION_TTL_HOURS, SessionStore, StoredSession, TOKEN_EXPIRY_KEY, USER_DATA_KEY,
    USER_TOKEN_KEY,
};
pub use sqlite::SqliteStore;

use keep_core::KeepResult;
use std::sync::Arc;

/// Durable string-keyed storage. Implementations must be shareable with the
/// background sync thread.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> KeepResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> KeepResult<()>;
    fn remove(&self, key: &str) -> KeepResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> KeepResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> KeepResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> KeepResult<()> {
        (**self).remove(key)
    }
}
