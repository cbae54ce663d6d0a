use keep_api::{Category, KeepApi, NoteDraft, RemoteNote};
use keep_core::KeepResult;
use std::sync::Arc;

/// The remote operations the notes client depends on.
pub trait NotesGateway: Send + Sync {
    fn list_notes(&self, token: &str) -> KeepResult<Vec<RemoteNote>>;
    fn list_categories(&self, token: &str) -> KeepResult<Vec<Category>>;
    fn create_note(&self, token: &str, draft: &NoteDraft) -> KeepResult<RemoteNote>;
    fn update_note(&self, token: &str, id: i64, draft: &NoteDraft) -> KeepResult<RemoteNote>;
    fn delete_note(&self, token: &str, id: i64) -> KeepResult<()>;
}

impl NotesGateway for KeepApi {
    fn list_notes(&self, token: &str) -> KeepResult<Vec<RemoteNote>> {
        KeepApi::list_notes(self, token)
    }

    fn list_categories(&self, token: &str) -> KeepResult<Vec<Category>> {
        KeepApi::list_categories(self, token)
    }

    fn create_note(&self, token: &str, draft: &NoteDraft) -> KeepResult<RemoteNote> {
        KeepApi::create_note(self, token, draft)
    }

    fn update_note(&self, token: &str, id: i64, draft: &NoteDraft) -> KeepResult<RemoteNote> {
        KeepApi::update_note(self, token, id, draft)
    }

    fn delete_note(&self, token: &str, id: i64) -> KeepResult<()> {
        KeepApi::delete_note(self, token, id)
    }
}

impl<T: NotesGateway + ?Sized> NotesGateway for Arc<T> {
    fn list_notes(&self, token: &str) -> KeepResult<Vec<RemoteNote>> {
        (**self).list_notes(token)
    }

    fn list_categories(&self, token: &str) -> KeepResult<Vec<Category>> {
        (**self).list_categories(token)
    }

    fn create_note(&self, token: &str, draft: &NoteDraft) -> KeepResult<RemoteNote> {
        (**self).create_note(token, draft)
    }

    fn update_note(&self, token: &str, id: i64, draft: &NoteDraft) -> KeepResult<RemoteNote> {
        (**self).update_note(token, id, draft)
    }

    fn delete_note(&self, token: &str, id: i64) -> KeepResult<()> {
        (**self).delete_note(token, id)
    }
}
