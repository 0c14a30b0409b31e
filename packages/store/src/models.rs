//! # Domain models for notes and sessions
//!
//! Defines the data structures held by the [`crate::LocalCache`] and the
//! session layer. These types are `Serialize + Deserialize` so that the
//! session can be persisted between restarts and so that tests can build them
//! from JSON fixtures.
//!
//! ## Types
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`NoteId`] | Opaque, stable note identity. Server-assigned ids are used verbatim; ids minted on the client for optimistic inserts carry the `local-` prefix. |
//! | [`Note`] | One note: title, body, owner and the created / last-modified timestamps. |
//! | [`NoteDraft`] | The editable part of a note (title + content) as submitted by the UI. |
//! | [`UserInfo`] | The signed-in user's profile. |
//! | [`BearerToken`] | Opaque access credential. Its `Debug` output is redacted. |
//! | [`Session`] | A token together with the user it was issued for. |

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of identities minted locally for notes the server has not confirmed yet.
pub const PROVISIONAL_PREFIX: &str = "local-";

/// Opaque note identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh client-side identity for an optimistic insert.
    pub fn provisional() -> Self {
        Self(format!("{PROVISIONAL_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// Whether this id was minted locally and never confirmed by the server.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A note as mirrored from (or optimistically destined for) the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Last-modified time. Server-provided once the note is confirmed.
    pub updated_at: DateTime<Utc>,
    /// Id of the user owning the note.
    pub owner_id: String,
}

impl Note {
    /// Build the optimistic copy of a note that is about to be created.
    pub fn provisional(draft: &NoteDraft, owner_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: NoteId::provisional(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            created_at: now,
            updated_at: now,
            owner_id: owner_id.into(),
        }
    }

    /// Copy of this note with the draft's fields applied and a local modification time.
    ///
    /// The modification time never moves backwards, even if the local clock is
    /// behind the server's.
    pub fn edited(&self, draft: &NoteDraft, now: DateTime<Utc>) -> Self {
        Self {
            title: draft.title.clone(),
            content: draft.content.clone(),
            updated_at: now.max(self.updated_at),
            ..self.clone()
        }
    }
}

/// Title and body of a note as submitted for create or update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Both the title and the body must contain something besides whitespace.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("note title is required");
        }
        if self.content.trim().is_empty() {
            return Err("note content is required");
        }
        Ok(())
    }
}

/// Profile of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl UserInfo {
    /// Get display name, falling back to email if name is blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Opaque bearer credential issued by the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// An authenticated session: the credential and the user it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: BearerToken,
    pub user: UserInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_provisional_ids_are_unique_and_marked() {
        let a = NoteId::provisional();
        let b = NoteId::provisional();
        assert_ne!(a, b);
        assert!(a.is_provisional());
        assert!(!NoteId::from("3f1c2a").is_provisional());
    }

    #[test]
    fn test_edited_keeps_identity_and_never_moves_time_back() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let note = Note {
            id: NoteId::from("n1"),
            title: "Old".to_string(),
            content: "Body".to_string(),
            created_at: created,
            updated_at: created,
            owner_id: "u1".to_string(),
        };

        let earlier = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let edited = note.edited(&NoteDraft::new("New", "Body 2"), earlier);
        assert_eq!(edited.id, note.id);
        assert_eq!(edited.created_at, created);
        assert_eq!(edited.updated_at, created);
        assert_eq!(edited.title, "New");
    }

    #[test]
    fn test_draft_validation() {
        assert!(NoteDraft::new("Title", "Body").validate().is_ok());
        assert_eq!(
            NoteDraft::new("  ", "Body").validate(),
            Err("note title is required")
        );
        assert_eq!(
            NoteDraft::new("Title", "\n").validate(),
            Err("note content is required")
        );
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = BearerToken::new("secret-value");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("secret-value"));
        assert_eq!(token.header_value(), "Bearer secret-value");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = UserInfo {
            id: "u1".to_string(),
            name: " ".to_string(),
            email: "ada@example.com".to_string(),
        };
        assert_eq!(user.display_name(), "ada@example.com");
    }
}
