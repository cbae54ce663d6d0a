use keep_store::{KeyValueStore, SessionStore};
use std::sync::{Arc, Mutex, PoisonError};

/// Supplies the bearer token for remote calls.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Called when the service rejected the current token.
    fn invalidate(&self) {}
}

impl<S: KeyValueStore> TokenProvider for SessionStore<S> {
    fn token(&self) -> Option<String> {
        match self.load() {
            Ok(session) => session.map(|session| session.token),
            Err(err) => {
                tracing::warn!("failed to load stored session: {err}");
                None
            }
        }
    }

    fn invalidate(&self) {
        if let Err(err) = self.sign_out() {
            tracing::warn!("failed to clear rejected session: {err}");
        }
    }
}

impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    fn token(&self) -> Option<String> {
        (**self).token()
    }

    fn is_authenticated(&self) -> bool {
        (**self).is_authenticated()
    }

    fn invalidate(&self) {
        (**self).invalidate()
    }
}

/// A token held in memory, e.g. passed on the command line.
#[derive(Debug, Default)]
pub struct StaticToken {
    token: Mutex<Option<String>>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|token| !token.trim().is_empty())
    }

    fn invalidate(&self) {
        self.clear();
    }
}
