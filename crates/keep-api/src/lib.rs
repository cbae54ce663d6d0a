mod envelope;
mod models;

pub use envelope::{decode_items, normalize_collection, unwrap_entity};
pub use models::{
    Category, LoginData, MAX_TITLE_CHARS, Note, NoteDraft, RemoteNote, UserProfile,
};

use keep_core::{KeepError, KeepResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone)]
pub struct KeepApi {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
    data: Option<ErrorEnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelopeData {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    access_token: Option<String>,
    user: Option<UserProfile>,
    message: Option<String>,
}

impl KeepApi {
    pub fn new(base_url: &str) -> KeepResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> KeepResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(KeepError::usage("server URL cannot be empty"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("keep/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| KeepError::io(format!("failed to construct API client: {err}")))?;

        Ok(Self {
            base_url: trimmed,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login(&self, email: &str, password: &str) -> KeepResult<LoginData> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(KeepError::usage("email and password are required"));
        }
        if !looks_like_email(email) {
            return Err(KeepError::usage(format!("'{email}' is not a valid email")));
        }

        let response = self
            .client
            .post(self.url("/login"))
            .header(ACCEPT, APPLICATION_JSON)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .map_err(network_error)?;

        let status = response.status();
        let body_text = response.text().unwrap_or_default();
        let envelope = serde_json::from_str::<LoginEnvelope>(&body_text)
            .map_err(|err| KeepError::malformed(format!("invalid login response: {err}")))?;

        match (status.is_success(), envelope.access_token, envelope.user) {
            (true, Some(access_token), Some(user)) if !access_token.trim().is_empty() => {
                Ok(LoginData { access_token, user })
            }
            _ => Err(KeepError::not_authenticated(envelope.message.unwrap_or_else(
                || "invalid credentials or unknown error".to_string(),
            ))),
        }
    }

    /// `GET /user`: cheap round trip used to check that a token still works.
    pub fn current_user(&self, token: &str) -> KeepResult<UserProfile> {
        let body = self.send_json(self.authorized(self.client.get(self.url("/user")), token)?)?;
        serde_json::from_value(unwrap_entity(body))
            .map_err(|err| KeepError::malformed(format!("invalid user payload: {err}")))
    }

    pub fn list_notes(&self, token: &str) -> KeepResult<Vec<RemoteNote>> {
        let body = self.send_json(self.authorized(self.client.get(self.url("/notes")), token)?)?;
        let items = normalize_collection(body)?;
        tracing::debug!(count = items.len(), "fetched notes");
        Ok(decode_items(items, "note"))
    }

    pub fn list_categories(&self, token: &str) -> KeepResult<Vec<Category>> {
        let body =
            self.send_json(self.authorized(self.client.get(self.url("/categories")), token)?)?;
        let items = normalize_collection(body)?;
        tracing::debug!(count = items.len(), "fetched categories");
        Ok(decode_items(items, "category"))
    }

    pub fn create_note(&self, token: &str, draft: &NoteDraft) -> KeepResult<RemoteNote> {
        let request = self
            .authorized(self.client.post(self.url("/notes")), token)?
            .json(&draft.sanitized());
        parse_note_entity(self.send_json(request)?, "created")
    }

    pub fn update_note(&self, token: &str, id: i64, draft: &NoteDraft) -> KeepResult<RemoteNote> {
        let request = self
            .authorized(self.client.put(self.url(&format!("/notes/{id}"))), token)?
            .json(&draft.sanitized());
        parse_note_entity(self.send_json(request)?, "updated")
    }

    pub fn delete_note(&self, token: &str, id: i64) -> KeepResult<()> {
        let request =
            self.authorized(self.client.delete(self.url(&format!("/notes/{id}"))), token)?;
        let response = request.send().map_err(network_error)?;
        ensure_success(response).map(|_| ())
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> KeepResult<RequestBuilder> {
        if token.trim().is_empty() {
            return Err(KeepError::not_authenticated(
                "no session token available; sign in first",
            ));
        }

        Ok(request.bearer_auth(token).header(ACCEPT, APPLICATION_JSON))
    }

    fn send_json(&self, request: RequestBuilder) -> KeepResult<Value> {
        let response = request.send().map_err(network_error)?;
        let body_text = ensure_success(response)?;
        serde_json::from_str::<Value>(&body_text)
            .map_err(|err| KeepError::malformed(format!("failed to decode API response JSON: {err}")))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Reads the body of a 2xx response, or turns anything else into
/// `RequestFailed`.
fn ensure_success(response: Response) -> KeepResult<String> {
    let status = response.status();
    let body_text = response.text().unwrap_or_default();

    if status.is_success() {
        return Ok(body_text);
    }

    let detail = serde_json::from_str::<ErrorEnvelope>(&body_text)
        .ok()
        .and_then(|payload| {
            payload
                .message
                .or(payload.error)
                .or_else(|| payload.data.and_then(|data| data.message))
        });
    tracing::debug!(status = status.as_u16(), "notes service rejected request");
    Err(KeepError::request_failed(status.as_u16(), detail.as_deref()))
}

fn parse_note_entity(body: Value, action: &str) -> KeepResult<RemoteNote> {
    let note = serde_json::from_value::<RemoteNote>(unwrap_entity(body)).map_err(|err| {
        KeepError::malformed(format!("failed to decode {action} note: {err}"))
    })?;

    if note.valid_id().is_none() {
        return Err(KeepError::invalid_entity(format!(
            "{action} note returned by the server has no id"
        )));
    }

    Ok(note)
}

fn looks_like_email(input: &str) -> bool {
    let Some((local, domain)) = input.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !input.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

fn network_error(err: reqwest::Error) -> KeepError {
    KeepError::network(format!("network request failed: {err}"))
}
