//! # HTTP transport — `reqwest` client for the notes REST API
//!
//! [`HttpTransport`] implements [`Transport`] on top of a shared
//! [`reqwest::Client`]. Request bodies and responses go through the [`wire`]
//! types; failures are classified into [`TransportError`]:
//!
//! | Failure | Error |
//! |---------|-------|
//! | connect / timeout / request could not be sent | `Network` |
//! | HTTP 401, 403 | `Unauthorized` |
//! | HTTP 404 | `NotFound` |
//! | HTTP 400, 409, 422 | `ValidationFailed` |
//! | any other non-2xx | `Server` |
//! | 2xx with an undecodable body | `Server` |
//!
//! The error message is the server's `detail` field when present.

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use store::{ApiConfig, BearerToken, Note, NoteDraft, NoteId, Session, UserInfo};

use crate::error::{TransportError, TransportResult};
use crate::transport::{SignInRequest, SignUpRequest, Transport};
use crate::wire::{
    ErrorBody, NoteBody, NoteResponse, NotesEnvelope, SignInBody, SignUpBody, TokenResponse,
    UserResponse,
};

/// `reqwest`-backed transport.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport from the `[api]` config section.
    pub fn new(config: &ApiConfig) -> TransportResult<Self> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            TransportError::Network(format!("invalid API base URL `{}`: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Network(format!(
                "API base URL `{}` cannot carry a path",
                config.base_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Absolute URL for the given path segments below the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        token: Option<&BearerToken>,
    ) -> RequestBuilder {
        let url = self.endpoint(segments);
        tracing::debug!(%method, %url, "notes api request");
        let builder = self.client.request(method, url);
        match token {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, token.header_value()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> TransportResult<Response> {
        let response = builder.send().await.map_err(classify_send_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message());
        let error = TransportError::from_status(status.as_u16(), detail);
        tracing::debug!(status = status.as_u16(), error = %error, "notes api request failed");
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> TransportResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Server(format!("malformed response body: {e}")))
    }
}

fn classify_send_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Network(format!("request timed out: {error}"))
    } else {
        TransportError::Network(error.to_string())
    }
}

impl Transport for HttpTransport {
    async fn sign_up(&self, request: &SignUpRequest) -> TransportResult<Session> {
        let builder = self
            .request(Method::POST, &["auth", "signup"], None)
            .json(&SignUpBody::from(request));
        let response: TokenResponse = self.send_json(builder).await?;
        Ok(response.into())
    }

    async fn sign_in(&self, request: &SignInRequest) -> TransportResult<Session> {
        let builder = self
            .request(Method::POST, &["auth", "signin"], None)
            .json(&SignInBody::from(request));
        let response: TokenResponse = self.send_json(builder).await?;
        Ok(response.into())
    }

    async fn current_user(&self, token: &BearerToken) -> TransportResult<UserInfo> {
        let builder = self.request(Method::GET, &["auth", "me"], Some(token));
        let user: UserResponse = self.send_json(builder).await?;
        Ok(user.into())
    }

    async fn list_notes(&self, token: &BearerToken) -> TransportResult<Vec<Note>> {
        let builder = self.request(Method::GET, &["notes"], Some(token));
        let envelope: NotesEnvelope = self.send_json(builder).await?;
        Ok(envelope.notes.into_iter().map(Note::from).collect())
    }

    async fn get_note(&self, token: &BearerToken, id: &NoteId) -> TransportResult<Note> {
        let builder = self.request(Method::GET, &["notes", id.as_str()], Some(token));
        let note: NoteResponse = self.send_json(builder).await?;
        Ok(note.into())
    }

    async fn create_note(&self, token: &BearerToken, draft: &NoteDraft) -> TransportResult<Note> {
        let builder = self
            .request(Method::POST, &["notes"], Some(token))
            .json(&NoteBody::from(draft));
        let note: NoteResponse = self.send_json(builder).await?;
        Ok(note.into())
    }

    async fn update_note(
        &self,
        token: &BearerToken,
        id: &NoteId,
        draft: &NoteDraft,
    ) -> TransportResult<Note> {
        let builder = self
            .request(Method::PUT, &["notes", id.as_str()], Some(token))
            .json(&NoteBody::from(draft));
        let note: NoteResponse = self.send_json(builder).await?;
        Ok(note.into())
    }

    async fn delete_note(&self, token: &BearerToken, id: &NoteId) -> TransportResult<()> {
        let builder = self.request(Method::DELETE, &["notes", id.as_str()], Some(token));
        self.send(builder).await?;
        Ok(())
    }
}
