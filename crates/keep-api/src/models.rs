use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest title accepted by the service.
pub const MAX_TITLE_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub color: String,
    #[serde(
        rename = "user_id",
        alias = "owner_id",
        default,
        deserialize_with = "deserialize_owner"
    )]
    pub owner_id: i64,
}

/// A note as the service returns it. Both `id` and `categories` may be
/// missing; only the reconciler turns this into a [`Note`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNote {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub content: String,
    #[serde(
        rename = "user_id",
        alias = "owner_id",
        default,
        deserialize_with = "deserialize_owner"
    )]
    pub owner_id: i64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
}

/// A note with its category bindings resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "user_id", alias = "owner_id", default)]
    pub owner_id: i64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl RemoteNote {
    /// Server-assigned id, if the payload carried a usable one.
    pub fn valid_id(&self) -> Option<i64> {
        self.id.filter(|id| *id > 0)
    }

    pub fn embedded_categories(&self) -> &[Category] {
        self.categories.as_deref().unwrap_or_default()
    }

    /// Builds the exposed note with the given bindings. Returns `None` when
    /// the payload has no usable id.
    pub fn into_note(self, categories: Vec<Category>) -> Option<Note> {
        let id = self.valid_id()?;
        Some(Note {
            id,
            title: self.title,
            content: self.content,
            owner_id: self.owner_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            categories,
        })
    }
}

impl Note {
    pub fn has_category(&self, category_id: i64) -> bool {
        self.categories
            .iter()
            .any(|category| category.id == category_id)
    }

    pub fn category_ids(&self) -> Vec<i64> {
        self.categories.iter().map(|category| category.id).collect()
    }
}

/// Body of `POST /notes` and `PUT /notes/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category_ids: Vec<i64>,
}

impl NoteDraft {
    pub fn new(title: &str, content: &str, category_ids: &[i64]) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
            category_ids: category_ids.to_vec(),
        }
    }

    /// Trims text fields, caps the title length and drops ids that cannot
    /// name a category.
    pub fn sanitized(&self) -> Self {
        Self {
            title: self.title.trim().chars().take(MAX_TITLE_CHARS).collect(),
            content: self.content.trim().to_string(),
            category_ids: self
                .category_ids
                .iter()
                .copied()
                .filter(|id| *id > 0)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    pub access_token: String,
    pub user: UserProfile,
}

/// Ids arrive as numbers from list endpoints but some write endpoints echo
/// them back as strings.
fn lenient_id(value: Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    lenient_id(value.clone())
        .ok_or_else(|| de::Error::custom(format!("expected an integer id, found {value}")))
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_id(Value::deserialize(deserializer)?))
}

fn deserialize_owner<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_id(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form some endpoints use.
/// Anything else reads as absent rather than failing the whole note.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::String(raw) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc()))
}
