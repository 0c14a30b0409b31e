//! # Client crate — session and optimistic note sync
//!
//! Everything the UI needs to show and edit a user's notes while the remote
//! API stays the source of truth.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`session`] | [`SessionManager`]: sign-in, sign-up, verification, logout and session persistence |
//! | [`engine`] | [`SyncEngine`]: refresh, optimistic create / update / delete with rollback |
//! | [`pending`] | [`PendingTable`]: per-note FIFO serialisation and cancellation of in-flight work |
//! | [`error`] | [`SyncError`] surfaced to the UI |
//! | [`logging`] | `tracing-subscriber` setup |
//!
//! [`connect`] wires the pieces together from a [`ClientConfig`].

pub mod engine;
pub mod error;
pub mod logging;
pub mod pending;
pub mod session;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use api::{HttpTransport, TransportError};
use store::{ClientConfig, FileSessionStore, LocalCache};

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use pending::{OperationKind, PendingOperation, PendingTable};
pub use session::SessionManager;

pub use store::{Note, NoteDraft, NoteId, Session, UserInfo};

/// Build the HTTP-backed engine described by `config` and restore any
/// persisted session.
pub fn connect(config: &ClientConfig) -> Result<SyncEngine<HttpTransport>, TransportError> {
    let transport = Arc::new(HttpTransport::new(&config.api)?);
    let store = FileSessionStore::new(
        &config.session.resolved_data_dir(),
        &config.session.storage_key,
    );
    tracing::debug!(path = %store.path().display(), "session storage");

    let session = Arc::new(SessionManager::new(transport, Arc::new(store)));
    session.restore();
    Ok(SyncEngine::new(session, LocalCache::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_restores_persisted_session() {
        let dir = std::env::temp_dir().join(format!("notes-client-connect-{}", std::process::id()));
        let config = ClientConfig::default().with_data_dir(dir.clone());

        let seeded = FileSessionStore::new(&dir, &config.session.storage_key);
        store::SessionStore::save(&seeded, &testing::session("tok-1", "u1")).unwrap();

        let engine = connect(&config).unwrap();
        assert_eq!(
            engine.session().bearer().map(|t| t.as_str().to_string()),
            Some("tok-1".to_string())
        );
        assert!(engine.notes().is_empty());

        engine.logout();
        assert!(!seeded.path().exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
