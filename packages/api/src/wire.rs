//! # JSON bodies exchanged with the notes REST service
//!
//! The server speaks snake_case field names prefixed by entity (`note_title`,
//! `user_email`, ...). These structs mirror that shape exactly and convert into
//! the `store` models used everywhere else.
//!
//! Timestamps are RFC 3339. Some deployments emit naive timestamps without an
//! offset; those are read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use store::{BearerToken, Note, NoteDraft, NoteId, Session, UserInfo};

use crate::transport::{SignInRequest, SignUpRequest};

/// Body of `POST /auth/signup`.
#[derive(Debug, Serialize)]
pub struct SignUpBody<'a> {
    pub user_name: &'a str,
    pub user_email: &'a str,
    pub password: &'a str,
}

impl<'a> From<&'a SignUpRequest> for SignUpBody<'a> {
    fn from(request: &'a SignUpRequest) -> Self {
        Self {
            user_name: &request.name,
            user_email: &request.email,
            password: &request.password,
        }
    }
}

/// Body of `POST /auth/signin`.
#[derive(Debug, Serialize)]
pub struct SignInBody<'a> {
    pub user_email: &'a str,
    pub password: &'a str,
}

impl<'a> From<&'a SignInRequest> for SignInBody<'a> {
    fn from(request: &'a SignInRequest) -> Self {
        Self {
            user_email: &request.email,
            password: &request.password,
        }
    }
}

/// Response of both auth endpoints.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: UserResponse,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<TokenResponse> for Session {
    fn from(response: TokenResponse) -> Self {
        Session {
            token: BearerToken::new(response.access_token),
            user: response.user.into(),
        }
    }
}

/// User as returned by the server.
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    pub last_update: Option<DateTime<Utc>>,
}

impl From<UserResponse> for UserInfo {
    fn from(user: UserResponse) -> Self {
        UserInfo {
            id: user.id,
            name: user.user_name,
            email: user.user_email,
        }
    }
}

/// Body of `POST /notes` and `PUT /notes/{id}`.
#[derive(Debug, Serialize)]
pub struct NoteBody<'a> {
    pub note_title: &'a str,
    pub note_content: &'a str,
}

impl<'a> From<&'a NoteDraft> for NoteBody<'a> {
    fn from(draft: &'a NoteDraft) -> Self {
        Self {
            note_title: &draft.title,
            note_content: &draft.content,
        }
    }
}

/// Note as returned by the server.
#[derive(Debug, Deserialize)]
pub struct NoteResponse {
    pub id: String,
    pub note_title: String,
    pub note_content: String,
    pub user_id: String,
    #[serde(deserialize_with = "timestamp")]
    pub created_on: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    pub last_update: DateTime<Utc>,
}

impl From<NoteResponse> for Note {
    fn from(note: NoteResponse) -> Self {
        Note {
            id: NoteId::new(note.id),
            title: note.note_title,
            content: note.note_content,
            created_at: note.created_on,
            updated_at: note.last_update,
            owner_id: note.user_id,
        }
    }
}

/// Response of `GET /notes`.
#[derive(Debug, Deserialize)]
pub struct NotesEnvelope {
    #[serde(default)]
    pub notes: Vec<NoteResponse>,
}

/// Error body. `detail` is a string for most errors and a list of field
/// errors for request validation failures.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Human-readable rendering of `detail`.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("msg").and_then(|m| m.as_str()) {
                        Some(msg) => msg.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                Some(parts.join("; "))
            }
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Parse a server timestamp, reading offset-less values as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
}

fn timestamp_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`"))),
        None => Ok(None),
    }
}
