pub mod cache;
pub mod config;
pub mod models;
pub mod session_store;

mod file_store;
pub use file_store::FileSessionStore;

pub use cache::{LocalCache, Placement};
pub use config::{ApiConfig, ClientConfig, SessionConfig};
pub use models::{BearerToken, Note, NoteDraft, NoteId, Session, UserInfo};
pub use session_store::{MemorySessionStore, SessionStore, SessionStoreError};
