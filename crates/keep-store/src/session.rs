use crate::KeyValueStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use keep_api::UserProfile;
use keep_core::{KeepError, KeepResult};
use serde::Serialize;

pub const USER_TOKEN_KEY: &str = "userToken";
pub const USER_DATA_KEY: &str = "userData";
pub const TOKEN_EXPIRY_KEY: &str = "tokenExpiry";

/// Lifetime granted to a token from the moment it is stored.
pub const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize)]
pub struct StoredSession {
    pub token: String,
    pub user: Option<UserProfile>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// Persists the bearer token, the signed-in user and the token expiry.
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn sign_in(&self, token: &str, user: &UserProfile) -> KeepResult<StoredSession> {
        self.sign_in_at(token, user, Utc::now())
    }

    pub fn sign_in_at(
        &self,
        token: &str,
        user: &UserProfile,
        now: DateTime<Utc>,
    ) -> KeepResult<StoredSession> {
        let token = token.trim();
        if token.is_empty() {
            return Err(KeepError::usage("cannot store an empty session token"));
        }

        let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
        let user_json = serde_json::to_string(user)
            .map_err(|err| KeepError::io(format!("failed to encode user data: {err}")))?;

        self.store.set(USER_TOKEN_KEY, token)?;
        self.store.set(USER_DATA_KEY, &user_json)?;
        self.store
            .set(TOKEN_EXPIRY_KEY, &expires_at.timestamp_millis().to_string())?;

        Ok(StoredSession {
            token: token.to_string(),
            user: Some(user.clone()),
            expires_at: Some(expires_at),
        })
    }

    pub fn load(&self) -> KeepResult<Option<StoredSession>> {
        self.load_at(Utc::now())
    }

    /// Returns the stored session, purging it first if it expired before
    /// `now`.
    pub fn load_at(&self, now: DateTime<Utc>) -> KeepResult<Option<StoredSession>> {
        let Some(token) = self
            .store
            .get(USER_TOKEN_KEY)?
            .filter(|token| !token.trim().is_empty())
        else {
            return Ok(None);
        };

        let user = self
            .store
            .get(USER_DATA_KEY)?
            .and_then(|raw| match serde_json::from_str::<UserProfile>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    tracing::warn!("ignoring unreadable stored user data: {err}");
                    None
                }
            });

        let expires_at = self
            .store
            .get(TOKEN_EXPIRY_KEY)?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single());

        let session = StoredSession {
            token,
            user,
            expires_at,
        };

        if session.is_expired_at(now) {
            tracing::info!("stored session expired; signing out");
            self.sign_out()?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub fn sign_out(&self) -> KeepResult<()> {
        self.store.remove(USER_TOKEN_KEY)?;
        self.store.remove(USER_DATA_KEY)?;
        self.store.remove(TOKEN_EXPIRY_KEY)?;
        Ok(())
    }
}
