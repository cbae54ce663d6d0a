//! Category reconciliation.
//!
//! The service does not reliably echo the note/category relation: list
//! responses sometimes omit it and write responses never include it. These
//! functions rebuild each note's `categories` from, in order, the server
//! payload, the previous in-memory note, and the persisted association map.

use keep_api::{Category, Note, RemoteNote};
use keep_core::{KeepError, KeepResult};
use keep_store::AssociationMap;
use std::collections::HashMap;

/// Resolves category ids against the known categories, keeping the order of
/// `ids` and silently skipping ids with no match.
pub fn resolve_categories(ids: &[i64], categories: &[Category]) -> Vec<Category> {
    ids.iter()
        .filter_map(|id| categories.iter().find(|category| category.id == *id))
        .cloned()
        .collect()
}

/// Finalizes a freshly fetched note list.
///
/// Notes without an id are dropped. Duplicate ids collapse to one note that
/// keeps the first position and the last payload.
pub fn reconcile_fetched(
    fetched: Vec<RemoteNote>,
    previous: &[Note],
    associations: &AssociationMap,
    categories: &[Category],
) -> Vec<Note> {
    let previous_by_id: HashMap<i64, &Note> = previous.iter().map(|note| (note.id, note)).collect();

    let mut order: Vec<i64> = Vec::with_capacity(fetched.len());
    let mut by_id: HashMap<i64, RemoteNote> = HashMap::with_capacity(fetched.len());
    let mut dropped = 0usize;

    for remote in fetched {
        let Some(id) = remote.valid_id() else {
            dropped += 1;
            continue;
        };
        if by_id.insert(id, remote).is_none() {
            order.push(id);
        }
    }

    if dropped > 0 {
        tracing::warn!("dropped {dropped} fetched notes without an id");
    }

    order
        .into_iter()
        .filter_map(|id| {
            let mut remote = by_id.remove(&id)?;
            let categories = match remote.categories.take() {
                Some(embedded) if !embedded.is_empty() => embedded,
                _ => previous_by_id
                    .get(&id)
                    .filter(|note| !note.categories.is_empty())
                    .map(|note| note.categories.clone())
                    .unwrap_or_else(|| remembered_categories(id, associations, categories)),
            };
            remote.into_note(categories)
        })
        .collect()
}

/// Finalizes the note returned by a create or update call. The ids the
/// caller submitted are authoritative: they become the note's categories and
/// replace the note's association entry (an empty selection removes it).
pub fn reconcile_written(
    remote: RemoteNote,
    submitted_ids: &[i64],
    categories: &[Category],
    associations: &mut AssociationMap,
) -> KeepResult<Note> {
    let resolved = resolve_categories(submitted_ids, categories);
    let note = remote.into_note(resolved).ok_or_else(|| {
        KeepError::invalid_entity("note returned by the server has no id")
    })?;

    remember(associations, note.id, submitted_ids);
    Ok(note)
}

/// Fills in `categories` from the association map when the note carries
/// none.
pub fn with_fallback_categories(
    mut note: Note,
    associations: &AssociationMap,
    categories: &[Category],
) -> Note {
    if note.categories.is_empty() {
        note.categories = remembered_categories(note.id, associations, categories);
    }
    note
}

/// Records the selection for `note_id`, or forgets it when empty.
pub fn remember(associations: &mut AssociationMap, note_id: i64, category_ids: &[i64]) {
    if category_ids.is_empty() {
        associations.remove(&note_id);
    } else {
        associations.insert(note_id, category_ids.to_vec());
    }
}

/// Replaces the note with the same id in place, or appends it.
pub fn upsert_note(notes: &mut Vec<Note>, note: Note) {
    match notes.iter_mut().find(|existing| existing.id == note.id) {
        Some(existing) => *existing = note,
        None => notes.push(note),
    }
}

fn remembered_categories(
    note_id: i64,
    associations: &AssociationMap,
    categories: &[Category],
) -> Vec<Category> {
    associations
        .get(&note_id)
        .map(|ids| resolve_categories(ids, categories))
        .unwrap_or_default()
}
