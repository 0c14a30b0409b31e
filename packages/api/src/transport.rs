//! The transport contract consumed by the session manager and the sync engine.

use std::fmt;
use std::future::Future;

use store::{BearerToken, Note, NoteDraft, NoteId, Session, UserInfo};

use crate::error::TransportResult;

/// Account creation request.
#[derive(Clone, PartialEq, Eq)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Credential exchange request.
#[derive(Clone, PartialEq, Eq)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Async request/response exchanges with the notes service.
///
/// Auth calls return a fresh [`Session`]; note calls take the caller's bearer
/// token and return server-confirmed notes.
pub trait Transport: Send + Sync {
    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = TransportResult<Session>> + Send;

    fn sign_in(
        &self,
        request: &SignInRequest,
    ) -> impl Future<Output = TransportResult<Session>> + Send;

    fn current_user(
        &self,
        token: &BearerToken,
    ) -> impl Future<Output = TransportResult<UserInfo>> + Send;

    fn list_notes(
        &self,
        token: &BearerToken,
    ) -> impl Future<Output = TransportResult<Vec<Note>>> + Send;

    fn get_note(
        &self,
        token: &BearerToken,
        id: &NoteId,
    ) -> impl Future<Output = TransportResult<Note>> + Send;

    fn create_note(
        &self,
        token: &BearerToken,
        draft: &NoteDraft,
    ) -> impl Future<Output = TransportResult<Note>> + Send;

    fn update_note(
        &self,
        token: &BearerToken,
        id: &NoteId,
        draft: &NoteDraft,
    ) -> impl Future<Output = TransportResult<Note>> + Send;

    fn delete_note(
        &self,
        token: &BearerToken,
        id: &NoteId,
    ) -> impl Future<Output = TransportResult<()>> + Send;
}
