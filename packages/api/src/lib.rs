//! # API crate — transport to the notes REST service
//!
//! This crate is the boundary between the client core and the remote notes API.
//! The sync engine and session manager in the `client` crate only talk to the
//! [`Transport`] trait; [`HttpTransport`] is the production implementation.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`transport`] | The [`Transport`] contract and the sign-in / sign-up request types |
//! | [`error`] | [`TransportError`] taxonomy and HTTP status classification |
//! | [`wire`] | JSON request/response bodies and their conversion into `store` models |
//! | [`http`] | [`HttpTransport`], a `reqwest` client for the REST endpoints |
//!
//! ## Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | `sign_up` | `POST /auth/signup` |
//! | `sign_in` | `POST /auth/signin` |
//! | `current_user` | `GET /auth/me` |
//! | `list_notes` | `GET /notes` |
//! | `get_note` | `GET /notes/{id}` |
//! | `create_note` | `POST /notes` |
//! | `update_note` | `PUT /notes/{id}` |
//! | `delete_note` | `DELETE /notes/{id}` |
//!
//! Every note call and `current_user` carry `Authorization: Bearer <token>`.

pub mod error;
pub mod http;
pub mod transport;
pub mod wire;

pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use transport::{SignInRequest, SignUpRequest, Transport};

pub use store::{BearerToken, Note, NoteDraft, NoteId, Session, UserInfo};
