use crate::auth::TokenProvider;
use crate::coordinator::{LoadingCounter, SyncGate, SyncReport, SyncStatus};
use crate::gateway::NotesGateway;
use crate::notify::{LogNotifier, Notifier};
use crate::reconcile::{
    reconcile_fetched, reconcile_written, remember, upsert_note, with_fallback_categories,
};
use chrono::{DateTime, Utc};
use keep_api::{Category, Note, NoteDraft};
use keep_core::{ErrorKind, KeepError, KeepResult};
use keep_store::{AssociationMap, CacheStore, KeyValueStore};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct NotesState {
    notes: Vec<Note>,
    categories: Vec<Category>,
    associations: AssociationMap,
}

/// The notes facade: owns the in-memory collections, talks to the remote
/// service through a [`NotesGateway`] and keeps the local cache current.
///
/// The client is `Send + Sync`; share it behind an `Arc` with the auto-sync
/// timer. The state lock is never held across a network or storage call.
/// Cache writes are serialized by a separate writer lock.
pub struct NotesClient<G, S, A> {
    gateway: G,
    cache: CacheStore<S>,
    auth: A,
    notifier: Box<dyn Notifier>,
    state: Mutex<NotesState>,
    /// Held from snapshot through cache write; taken before `state`.
    writer: Mutex<()>,
    sync: SyncGate,
    loading: LoadingCounter,
}

impl<G, S, A> NotesClient<G, S, A>
where
    G: NotesGateway,
    S: KeyValueStore,
    A: TokenProvider,
{
    /// Builds the client and hydrates it from whatever the cache holds.
    pub fn new(gateway: G, store: S, auth: A) -> Self {
        let cache = CacheStore::new(store);
        let state = NotesState {
            notes: cache.load_notes(),
            categories: cache.load_categories(),
            associations: cache.load_associations(),
        };
        tracing::debug!(
            notes = state.notes.len(),
            categories = state.categories.len(),
            associations = state.associations.len(),
            "hydrated notes client from cache"
        );

        let sync = SyncGate::with_last_success(cache.last_sync_time());

        Self {
            gateway,
            cache,
            auth,
            notifier: Box::new(LogNotifier),
            state: Mutex::new(state),
            writer: Mutex::new(()),
            sync,
            loading: LoadingCounter::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn fetch_notes(&self) -> KeepResult<Vec<Note>> {
        self.report("load notes", self.fetch_notes_inner())
    }

    pub fn fetch_categories(&self) -> KeepResult<Vec<Category>> {
        self.report("load categories", self.fetch_categories_inner())
    }

    pub fn create_note(&self, title: &str, content: &str, category_ids: &[i64]) -> KeepResult<Note> {
        self.report(
            "create note",
            self.write_note(None, NoteDraft::new(title, content, category_ids)),
        )
    }

    pub fn update_note(
        &self,
        id: i64,
        title: &str,
        content: &str,
        category_ids: &[i64],
    ) -> KeepResult<Note> {
        self.report(
            "update note",
            self.write_note(Some(id), NoteDraft::new(title, content, category_ids)),
        )
    }

    /// Deletes the note remotely, then drops it and its association entry
    /// locally. Succeeds for ids that are not cached as long as the service
    /// accepted the request.
    pub fn delete_note(&self, id: i64) -> KeepResult<()> {
        self.report("delete note", self.delete_note_inner(id))
    }

    /// Returns a copy of the note with its categories filled in.
    pub fn get_note(&self, id: i64) -> Option<Note> {
        let state = self.lock_state();
        let note = state.notes.iter().find(|note| note.id == id)?.clone();
        Some(with_fallback_categories(
            note,
            &state.associations,
            &state.categories,
        ))
    }

    /// Case-insensitive substring match over title or content. A blank query
    /// matches everything.
    pub fn search_notes(&self, query: &str) -> Vec<Note> {
        let needle = query.trim().to_lowercase();
        let state = self.lock_state();
        if needle.is_empty() {
            return state.notes.clone();
        }
        state
            .notes
            .iter()
            .filter(|note| {
                note.title.to_lowercase().contains(&needle)
                    || note.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn filter_notes_by_category(&self, category_id: Option<i64>) -> Vec<Note> {
        match category_id {
            Some(id) => self.filter_notes_by_categories(&[id]),
            None => self.notes(),
        }
    }

    /// Notes bound to any of `category_ids`; an empty set matches everything.
    pub fn filter_notes_by_categories(&self, category_ids: &[i64]) -> Vec<Note> {
        let state = self.lock_state();
        if category_ids.is_empty() {
            return state.notes.clone();
        }
        state
            .notes
            .iter()
            .filter(|note| category_ids.iter().any(|id| note.has_category(*id)))
            .cloned()
            .collect()
    }

    /// Refreshes categories then notes. Fails immediately with
    /// `SyncInProgress` when another sync holds the gate.
    pub fn sync_all(&self) -> KeepResult<SyncReport> {
        self.report("synchronize", self.sync_all_inner())
    }

    /// A sync run by the timer: failures are logged, never surfaced.
    pub fn background_sync(&self) -> Option<SyncReport> {
        match self.sync_all_inner() {
            Ok(report) => Some(report),
            Err(err) if err.kind == ErrorKind::SyncInProgress => {
                tracing::debug!("skipping scheduled sync: {}", err.message);
                None
            }
            Err(err) => {
                if err.is_unauthorized() {
                    self.auth.invalidate();
                }
                tracing::error!(kind = ?err.kind, "background sync failed: {}", err.message);
                None
            }
        }
    }

    /// Drops every cached collection, empties memory and pulls a fresh copy.
    pub fn clear_cache(&self) -> KeepResult<SyncReport> {
        self.report("clear cache", self.clear_cache_inner())
    }

    pub fn notes(&self) -> Vec<Note> {
        self.lock_state().notes.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.lock_state().categories.clone()
    }

    pub fn associations(&self) -> AssociationMap {
        self.lock_state().associations.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_syncing()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.sync.last_success()
    }

    pub fn auto_sync_enabled(&self) -> bool {
        self.cache.auto_sync_enabled()
    }

    /// Persists the preference only; the timer lives in [`crate::AutoSync`].
    pub fn store_auto_sync_enabled(&self, enabled: bool) -> KeepResult<()> {
        self.cache.set_auto_sync_enabled(enabled)
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    pub fn status(&self) -> SyncStatus {
        let (cached_notes, cached_categories) = {
            let state = self.lock_state();
            (state.notes.len(), state.categories.len())
        };
        SyncStatus {
            is_syncing: self.is_syncing(),
            is_loading: self.is_loading(),
            last_sync_time: self.last_sync_time(),
            auto_sync_enabled: self.auto_sync_enabled(),
            authenticated: self.is_authenticated(),
            api_calls: self.loading.started(),
            cached_notes,
            cached_categories,
        }
    }

    fn fetch_notes_inner(&self) -> KeepResult<Vec<Note>> {
        let token = self.require_token()?;
        let _loading = self.loading.enter();
        let fetched = self.gateway.list_notes(&token)?;

        let notes = self.commit(|state| {
            state.notes = reconcile_fetched(
                fetched,
                &state.notes,
                &state.associations,
                &state.categories,
            );
            Ok(state.notes.clone())
        })?;
        tracing::debug!(count = notes.len(), "fetched notes");
        Ok(notes)
    }

    fn fetch_categories_inner(&self) -> KeepResult<Vec<Category>> {
        let token = self.require_token()?;
        let _loading = self.loading.enter();
        let categories = self.gateway.list_categories(&token)?;

        let _writer = self.lock_writer();
        self.lock_state().categories = categories.clone();
        self.cache.save_categories(&categories)?;
        tracing::debug!(count = categories.len(), "fetched categories");
        Ok(categories)
    }

    fn write_note(&self, id: Option<i64>, draft: NoteDraft) -> KeepResult<Note> {
        let token = self.require_token()?;
        let _loading = self.loading.enter();
        let draft = draft.sanitized();
        let remote = match id {
            Some(id) => self.gateway.update_note(&token, id, &draft)?,
            None => self.gateway.create_note(&token, &draft)?,
        };

        self.commit(|state| {
            let NotesState {
                notes,
                categories,
                associations,
            } = state;
            let note = reconcile_written(remote, &draft.category_ids, categories, associations)?;
            upsert_note(notes, note.clone());
            Ok(note)
        })
    }

    fn delete_note_inner(&self, id: i64) -> KeepResult<()> {
        let token = self.require_token()?;
        let _loading = self.loading.enter();
        self.gateway.delete_note(&token, id)?;

        self.commit(|state| {
            state.notes.retain(|note| note.id != id);
            remember(&mut state.associations, id, &[]);
            Ok(())
        })
    }

    /// Applies `change` to memory and writes the resulting notes and
    /// associations to the cache. Writers run one at a time from snapshot to
    /// save, so the cache always ends with the newest state.
    fn commit<T>(&self, change: impl FnOnce(&mut NotesState) -> KeepResult<T>) -> KeepResult<T> {
        let _writer = self.lock_writer();
        let (value, notes, associations) = {
            let mut state = self.lock_state();
            let value = change(&mut *state)?;
            (value, state.notes.clone(), state.associations.clone())
        };

        self.cache.save_notes(&notes)?;
        self.cache.save_associations(&associations)?;
        Ok(value)
    }

    fn sync_all_inner(&self) -> KeepResult<SyncReport> {
        let guard = self.sync.try_begin().ok_or_else(KeepError::sync_in_progress)?;

        let categories = self.fetch_categories_inner()?;
        let notes = self.fetch_notes_inner()?;

        let completed_at = Utc::now();
        guard.mark_success(completed_at);
        if let Err(err) = self.cache.set_last_sync_time(completed_at) {
            tracing::warn!("failed to persist last sync time: {err}");
        }
        tracing::info!(
            notes = notes.len(),
            categories = categories.len(),
            "synchronization complete"
        );
        Ok(SyncReport {
            notes: notes.len(),
            categories: categories.len(),
            completed_at,
        })
    }

    fn clear_cache_inner(&self) -> KeepResult<SyncReport> {
        {
            let _writer = self.lock_writer();
            self.cache.clear()?;
            *self.lock_state() = NotesState::default();
        }
        tracing::info!("local cache cleared");
        self.sync_all_inner()
    }

    fn require_token(&self) -> KeepResult<String> {
        self.auth
            .token()
            .ok_or_else(|| KeepError::not_authenticated("not signed in"))
    }

    fn report<T>(&self, action: &str, result: KeepResult<T>) -> KeepResult<T> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                self.auth.invalidate();
            }
            self.notifier.notify_failure(action, err);
        }
        result
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, NotesState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use keep_api::RemoteNote;
    use keep_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Condvar};
    use std::thread;
    use std::time::Duration;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            color: "#112233".to_string(),
            owner_id: 1,
        }
    }

    fn remote(id: i64, title: &str, content: &str) -> RemoteNote {
        RemoteNote {
            id: Some(id),
            title: title.to_string(),
            content: content.to_string(),
            owner_id: 1,
            ..RemoteNote::default()
        }
    }

    #[derive(Default)]
    struct FakeState {
        notes: Vec<RemoteNote>,
        categories: Vec<Category>,
        next_id: i64,
        fail_with: Option<KeepError>,
        write_without_id: bool,
        drafts: Vec<NoteDraft>,
        deleted: Vec<i64>,
    }

    #[derive(Default)]
    struct FakeGateway {
        state: Mutex<FakeState>,
        list_calls: AtomicUsize,
        category_calls: AtomicUsize,
        /// When set, `list_categories` parks until the test opens the latch.
        latch: Option<Arc<(Mutex<bool>, Condvar)>>,
        entered: Option<Mutex<mpsc::Sender<()>>>,
    }

    impl FakeGateway {
        fn with_data(notes: Vec<RemoteNote>, categories: Vec<Category>) -> Self {
            let gateway = Self::default();
            {
                let mut state = gateway.state.lock().unwrap();
                state.notes = notes;
                state.categories = categories;
                state.next_id = 100;
            }
            gateway
        }

        fn state(&self) -> MutexGuard<'_, FakeState> {
            self.state.lock().unwrap()
        }

        fn check(&self) -> KeepResult<()> {
            match self.state().fail_with.clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    impl NotesGateway for FakeGateway {
        fn list_notes(&self, _token: &str) -> KeepResult<Vec<RemoteNote>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(self.state().notes.clone())
        }

        fn list_categories(&self, _token: &str) -> KeepResult<Vec<Category>> {
            self.category_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(entered) = &self.entered {
                entered.lock().unwrap().send(()).unwrap();
            }
            if let Some(latch) = &self.latch {
                let (open, signal) = &**latch;
                let mut open = open.lock().unwrap();
                while !*open {
                    open = signal.wait(open).unwrap();
                }
            }
            self.check()?;
            Ok(self.state().categories.clone())
        }

        fn create_note(&self, _token: &str, draft: &NoteDraft) -> KeepResult<RemoteNote> {
            self.check()?;
            let mut state = self.state();
            state.drafts.push(draft.clone());
            if state.write_without_id {
                return Ok(RemoteNote::default());
            }
            state.next_id += 1;
            let note = remote(state.next_id, &draft.title, &draft.content);
            state.notes.push(note.clone());
            Ok(note)
        }

        fn update_note(&self, _token: &str, id: i64, draft: &NoteDraft) -> KeepResult<RemoteNote> {
            self.check()?;
            let mut state = self.state();
            state.drafts.push(draft.clone());
            let note = remote(id, &draft.title, &draft.content);
            match state.notes.iter_mut().find(|existing| existing.id == Some(id)) {
                Some(existing) => *existing = note.clone(),
                None => state.notes.push(note.clone()),
            }
            Ok(note)
        }

        fn delete_note(&self, _token: &str, id: i64) -> KeepResult<()> {
            self.check()?;
            let mut state = self.state();
            state.deleted.push(id);
            state.notes.retain(|note| note.id != Some(id));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Arc<Mutex<Vec<(String, ErrorKind)>>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify_failure(&self, action: &str, error: &KeepError) {
            self.seen
                .lock()
                .unwrap()
                .push((action.to_string(), error.kind));
        }
    }

    type TestClient = NotesClient<Arc<FakeGateway>, Arc<MemoryStore>, Arc<StaticToken>>;

    fn client_with(gateway: FakeGateway) -> (TestClient, Arc<FakeGateway>, Arc<MemoryStore>) {
        let gateway = Arc::new(gateway);
        let store = Arc::new(MemoryStore::new());
        let client = NotesClient::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            Arc::new(StaticToken::new("token-1")),
        );
        (client, gateway, store)
    }

    fn standard_categories() -> Vec<Category> {
        vec![category(1, "Work"), category(2, "Home"), category(5, "Ideas")]
    }

    #[test]
    fn fetched_notes_always_carry_categories() {
        let mut with_embedded = remote(1, "one", "");
        with_embedded.categories = Some(vec![category(2, "Home")]);
        let (client, _, _) = client_with(FakeGateway::with_data(
            vec![with_embedded, remote(2, "two", "")],
            standard_categories(),
        ));

        client.sync_all().expect("sync");

        let notes = client.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].category_ids(), vec![2]);
        assert!(notes[1].categories.is_empty());
    }

    #[test]
    fn created_note_resolves_submitted_categories() {
        let (client, gateway, store) =
            client_with(FakeGateway::with_data(Vec::new(), standard_categories()));
        client.fetch_categories().expect("categories");

        let created = client
            .create_note("Groceries", "milk", &[1, 2])
            .expect("create");

        let fetched = client.get_note(created.id).expect("note cached");
        assert_eq!(fetched.category_ids(), vec![1, 2]);
        assert_eq!(client.associations().get(&created.id), Some(&vec![1, 2]));
        assert_eq!(gateway.state().drafts[0].category_ids, vec![1, 2]);

        let cache = CacheStore::new(Arc::clone(&store));
        assert_eq!(cache.load_notes().len(), 1);
        assert_eq!(cache.load_associations().get(&created.id), Some(&vec![1, 2]));
    }

    #[test]
    fn clearing_a_selection_forgets_the_association() {
        let (client, _, _) =
            client_with(FakeGateway::with_data(Vec::new(), standard_categories()));
        client.fetch_categories().expect("categories");
        let created = client.create_note("Plan", "", &[1]).expect("create");

        let updated = client
            .update_note(created.id, "Plan", "draft", &[])
            .expect("update");
        assert!(updated.categories.is_empty());
        assert!(!client.associations().contains_key(&created.id));

        client.fetch_notes().expect("fetch");
        assert!(client.get_note(created.id).expect("note").categories.is_empty());
    }

    #[test]
    fn association_map_fills_categories_the_server_omits() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(Arc::clone(&store));
        cache
            .save_associations(&AssociationMap::from([(1, vec![5])]))
            .expect("seed map");
        let gateway = Arc::new(FakeGateway::with_data(
            vec![remote(1, "idea", "")],
            standard_categories(),
        ));
        let client = NotesClient::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            Arc::new(StaticToken::new("token-1")),
        );

        client.sync_all().expect("sync");

        let note = client.get_note(1).expect("note");
        assert_eq!(note.categories, vec![category(5, "Ideas")]);
    }

    #[test]
    fn unknown_category_ids_stay_in_the_map_until_they_resolve() {
        let (client, gateway, _) =
            client_with(FakeGateway::with_data(Vec::new(), vec![category(1, "Work")]));
        client.fetch_categories().expect("categories");

        let created = client.create_note("Later", "", &[9, 0]).expect("create");
        assert!(created.categories.is_empty());
        assert_eq!(client.associations().get(&created.id), Some(&vec![9]));

        gateway.state().categories.push(category(9, "New"));
        client.sync_all().expect("sync");
        assert_eq!(
            client.get_note(created.id).expect("note").categories,
            vec![category(9, "New")]
        );
    }

    #[test]
    fn search_is_trimmed_and_case_insensitive() {
        let (client, _, _) = client_with(FakeGateway::with_data(
            vec![
                remote(1, "Shopping List", "eggs"),
                remote(2, "Ideas", "buy a LIST of books"),
                remote(3, "Other", "nothing"),
            ],
            Vec::new(),
        ));
        client.fetch_notes().expect("fetch");

        let ids = |notes: Vec<Note>| notes.iter().map(|note| note.id).collect::<Vec<_>>();
        assert_eq!(ids(client.search_notes("  list ")), vec![1, 2]);
        assert_eq!(ids(client.search_notes("")), vec![1, 2, 3]);
        assert_eq!(ids(client.search_notes("   ")), vec![1, 2, 3]);
        assert!(client.search_notes("absent").is_empty());
    }

    #[test]
    fn filters_match_any_selected_category() {
        let mut work = remote(1, "work", "");
        work.categories = Some(vec![category(1, "Work")]);
        let mut home = remote(2, "home", "");
        home.categories = Some(vec![category(2, "Home")]);
        let (client, _, _) = client_with(FakeGateway::with_data(
            vec![work, home, remote(3, "loose", "")],
            standard_categories(),
        ));
        client.fetch_notes().expect("fetch");

        assert_eq!(client.filter_notes_by_category(Some(1)).len(), 1);
        assert_eq!(client.filter_notes_by_category(None).len(), 3);
        assert_eq!(client.filter_notes_by_categories(&[1, 2]).len(), 2);
        assert_eq!(client.filter_notes_by_categories(&[]).len(), 3);
    }

    #[test]
    fn deleting_an_uncached_note_succeeds() {
        let (client, gateway, _) = client_with(FakeGateway::with_data(Vec::new(), Vec::new()));

        client.delete_note(42).expect("delete");

        assert_eq!(gateway.state().deleted, vec![42]);
        assert!(client.notes().is_empty());
    }

    #[test]
    fn deleting_removes_note_and_association() {
        let (client, _, store) =
            client_with(FakeGateway::with_data(Vec::new(), standard_categories()));
        client.fetch_categories().expect("categories");
        let created = client.create_note("Temp", "", &[2]).expect("create");

        client.delete_note(created.id).expect("delete");

        assert!(client.get_note(created.id).is_none());
        assert!(client.associations().is_empty());
        let cache = CacheStore::new(Arc::clone(&store));
        assert!(cache.load_notes().is_empty());
        assert!(cache.load_associations().is_empty());
    }

    #[test]
    fn write_without_id_is_reported_and_leaves_state_alone() {
        let gateway = FakeGateway::with_data(Vec::new(), standard_categories());
        gateway.state().write_without_id = true;
        let (client, _, _) = client_with(gateway);
        let notifier = RecordingNotifier::default();
        let seen = Arc::clone(&notifier.seen);
        let client = client.with_notifier(notifier);

        let err = client.create_note("x", "", &[1]).unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidEntity);
        assert!(client.notes().is_empty());
        assert!(client.associations().is_empty());
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[("create note".to_string(), ErrorKind::InvalidEntity)]
        );
    }

    #[test]
    fn missing_token_fails_without_network_calls() {
        let gateway = Arc::new(FakeGateway::default());
        let client = NotesClient::new(
            Arc::clone(&gateway),
            MemoryStore::new(),
            StaticToken::signed_out(),
        );

        let err = client.sync_all().unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotAuthenticated);
        assert_eq!(gateway.category_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.status().api_calls, 0);
        assert!(!client.is_syncing());
        assert!(client.last_sync_time().is_none());
    }

    #[test]
    fn unauthorized_response_signs_the_session_out() {
        let gateway = FakeGateway::with_data(Vec::new(), Vec::new());
        gateway.state().fail_with = Some(KeepError::request_failed(401, Some("expired")));
        let auth = Arc::new(StaticToken::new("token-1"));
        let client = NotesClient::new(Arc::new(gateway), MemoryStore::new(), Arc::clone(&auth));

        let err = client.fetch_notes().unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotAuthenticated);
        assert!(!auth.is_authenticated());
        assert!(!client.is_authenticated());
    }

    #[test]
    fn failed_sync_keeps_cached_collections() {
        let store = Arc::new(MemoryStore::new());
        CacheStore::new(Arc::clone(&store))
            .save_notes(&[remote(7, "cached", "").into_note(Vec::new()).unwrap()])
            .expect("seed cache");
        let gateway = FakeGateway::default();
        gateway.state().fail_with = Some(KeepError::request_failed(503, None));
        let client = NotesClient::new(
            Arc::new(gateway),
            Arc::clone(&store),
            StaticToken::new("token-1"),
        );

        let err = client.sync_all().unwrap_err();

        assert_eq!(err.status, Some(503));
        assert_eq!(client.notes().len(), 1);
        assert!(!client.is_syncing());
        assert!(client.last_sync_time().is_none());
        assert!(client.background_sync().is_none());
    }

    #[test]
    fn clear_cache_empties_storage_then_resyncs() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(Arc::clone(&store));
        cache
            .save_associations(&AssociationMap::from([(3, vec![1])]))
            .expect("seed map");
        cache.set_auto_sync_enabled(false).expect("seed preference");
        let gateway = Arc::new(FakeGateway::with_data(
            vec![remote(3, "fresh", "")],
            standard_categories(),
        ));
        let client = NotesClient::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            StaticToken::new("token-1"),
        );

        let report = client.clear_cache().expect("clear");

        assert_eq!(report.notes, 1);
        assert_eq!(report.categories, 3);
        assert!(client.associations().is_empty());
        assert!(client.get_note(3).expect("note").categories.is_empty());
        assert!(!client.auto_sync_enabled());
        assert!(client.last_sync_time().is_some());
    }

    #[test]
    fn concurrent_sync_is_rejected_without_extra_requests() {
        let latch = Arc::new((Mutex::new(false), Condvar::new()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let mut gateway = FakeGateway::with_data(vec![remote(1, "one", "")], Vec::new());
        gateway.latch = Some(Arc::clone(&latch));
        gateway.entered = Some(Mutex::new(entered_tx));
        let (client, gateway, _) = client_with(gateway);
        let client = Arc::new(client);

        let first = {
            let client = Arc::clone(&client);
            thread::spawn(move || client.sync_all())
        };
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("first sync reached the gateway");
        assert!(client.is_syncing());

        let err = client.sync_all().unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyncInProgress);

        {
            let (open, signal) = &*latch;
            *open.lock().unwrap() = true;
            signal.notify_all();
        }
        first.join().unwrap().expect("first sync");

        assert_eq!(gateway.category_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.status().api_calls, 2);
        assert!(!client.is_syncing());
        assert!(client.last_sync_time().is_some());
    }

    #[test]
    fn client_hydrates_from_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(Arc::clone(&store));
        cache.save_categories(&standard_categories()).expect("seed");
        cache
            .save_notes(&[remote(4, "offline", "").into_note(Vec::new()).unwrap()])
            .expect("seed");
        cache
            .save_associations(&AssociationMap::from([(4, vec![2])]))
            .expect("seed");

        let client = NotesClient::new(
            FakeGateway::default(),
            Arc::clone(&store),
            StaticToken::signed_out(),
        );

        assert_eq!(client.status().cached_notes, 1);
        assert_eq!(client.get_note(4).expect("note").category_ids(), vec![2]);
    }

    /// Parks the first write of the notes key until the test opens the latch.
    struct StallingStore {
        inner: MemoryStore,
        latch: Arc<(Mutex<bool>, Condvar)>,
        entered: Mutex<Option<mpsc::Sender<()>>>,
    }

    impl KeyValueStore for StallingStore {
        fn get(&self, key: &str) -> KeepResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> KeepResult<()> {
            if key == keep_store::NOTES_KEY
                && let Some(entered) = self.entered.lock().unwrap().take()
            {
                entered.send(()).unwrap();
                let (open, signal) = &*self.latch;
                let mut open = open.lock().unwrap();
                while !*open {
                    open = signal.wait(open).unwrap();
                }
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> KeepResult<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn overlapping_writes_leave_cache_matching_memory() {
        let latch = Arc::new((Mutex::new(false), Condvar::new()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let store = Arc::new(StallingStore {
            inner: MemoryStore::new(),
            latch: Arc::clone(&latch),
            entered: Mutex::new(Some(entered_tx)),
        });
        let client = Arc::new(NotesClient::new(
            Arc::new(FakeGateway::with_data(Vec::new(), standard_categories())),
            Arc::clone(&store),
            StaticToken::new("token-1"),
        ));

        let create = {
            let client = Arc::clone(&client);
            thread::spawn(move || client.create_note("doomed", "", &[1]))
        };
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("create reached the cache write");

        let delete = {
            let client = Arc::clone(&client);
            thread::spawn(move || client.delete_note(101))
        };
        thread::sleep(Duration::from_millis(50));
        {
            let (open, signal) = &*latch;
            *open.lock().unwrap() = true;
            signal.notify_all();
        }

        assert_eq!(create.join().unwrap().expect("create").id, 101);
        delete.join().unwrap().expect("delete");

        let cache = CacheStore::new(Arc::clone(&store));
        assert!(client.notes().is_empty());
        assert!(cache.load_notes().is_empty(), "cache diverged from memory");
        assert!(cache.load_associations().is_empty());
    }
}
