use crate::KeyValueStore;
use chrono::{DateTime, Utc};
use keep_api::{Category, Note, RemoteNote, decode_items, normalize_collection};
use keep_core::{KeepError, KeepResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

pub const NOTES_KEY: &str = "notes";
pub const CATEGORIES_KEY: &str = "categories";
pub const NOTE_CATEGORIES_KEY: &str = "note-categories";
pub const AUTO_SYNC_KEY: &str = "autoSyncEnabled";
pub const LAST_SYNC_KEY: &str = "lastSyncTime";

/// Note id to the category ids the user last assigned to it.
pub type AssociationMap = BTreeMap<i64, Vec<i64>>;

/// Typed access to the cached collections. Reads never fail: a missing,
/// unreadable or unparsable entry is an empty collection.
#[derive(Debug, Clone)]
pub struct CacheStore<S> {
    store: S,
}

impl<S: KeyValueStore> CacheStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn load_notes(&self) -> Vec<Note> {
        let Some(items) = self.load_collection(NOTES_KEY) else {
            return Vec::new();
        };

        let total = items.len();
        let notes: Vec<Note> = decode_items::<RemoteNote>(items, "cached note")
            .into_iter()
            .filter_map(|mut remote| {
                let categories = remote.categories.take().unwrap_or_default();
                remote.into_note(categories)
            })
            .collect();

        if notes.len() != total {
            tracing::warn!(
                "filtered {} cached notes without an id",
                total - notes.len()
            );
        }

        notes
    }

    pub fn save_notes(&self, notes: &[Note]) -> KeepResult<()> {
        self.save_json(NOTES_KEY, notes)
    }

    pub fn load_categories(&self) -> Vec<Category> {
        self.load_collection(CATEGORIES_KEY)
            .map(|items| decode_items(items, "cached category"))
            .unwrap_or_default()
    }

    pub fn save_categories(&self, categories: &[Category]) -> KeepResult<()> {
        self.save_json(CATEGORIES_KEY, categories)
    }

    pub fn load_associations(&self) -> AssociationMap {
        self.load_json::<AssociationMap>(NOTE_CATEGORIES_KEY)
            .unwrap_or_default()
    }

    pub fn save_associations(&self, associations: &AssociationMap) -> KeepResult<()> {
        self.save_json(NOTE_CATEGORIES_KEY, associations)
    }

    /// Automatic sync is on unless the user turned it off.
    pub fn auto_sync_enabled(&self) -> bool {
        match self.read_raw(AUTO_SYNC_KEY) {
            Some(raw) => raw.trim() != "false",
            None => true,
        }
    }

    pub fn set_auto_sync_enabled(&self, enabled: bool) -> KeepResult<()> {
        self.store
            .set(AUTO_SYNC_KEY, if enabled { "true" } else { "false" })
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.read_raw(LAST_SYNC_KEY)?;
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(err) => {
                tracing::warn!("ignoring unreadable last sync time: {err}");
                None
            }
        }
    }

    pub fn set_last_sync_time(&self, at: DateTime<Utc>) -> KeepResult<()> {
        self.store.set(LAST_SYNC_KEY, &at.to_rfc3339())
    }

    /// Drops the cached notes, categories and associations. Preferences and
    /// the last sync time are kept.
    pub fn clear(&self) -> KeepResult<()> {
        self.store.remove(NOTES_KEY)?;
        self.store.remove(CATEGORIES_KEY)?;
        self.store.remove(NOTE_CATEGORIES_KEY)?;
        Ok(())
    }

    fn load_collection(&self, key: &str) -> Option<Vec<Value>> {
        let value = self.load_json::<Value>(key)?;
        match normalize_collection(value) {
            Ok(items) => Some(items),
            Err(err) => {
                tracing::warn!("ignoring cached '{key}': {err}");
                None
            }
        }
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str::<T>(&raw) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!("failed to parse cached '{key}', treating it as empty: {err}");
                None
            }
        }
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(raw) => raw.filter(|raw| !raw.trim().is_empty()),
            Err(err) => {
                tracing::warn!("failed to read cached '{key}', treating it as empty: {err}");
                None
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> KeepResult<()> {
        let payload = serde_json::to_string(value)
            .map_err(|err| KeepError::io(format!("failed to encode cached '{key}': {err}")))?;
        self.store.set(key, &payload)
    }
}
