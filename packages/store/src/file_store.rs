//! # Filesystem-backed session store
//!
//! [`FileSessionStore`] is a [`SessionStore`] implementation that persists the
//! signed-in session as a JSON document named after the configured storage
//! key. It is used on desktop to keep the user signed in across restarts.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//! └── <storage_key>.json     # {"token": "...", "user": {...}}
//! ```
//!
//! ## Platform data directories
//!
//! [`crate::SessionConfig::data_dir`] defaults to [`dirs::data_dir()`]:
//!
//! | Platform | Path |
//! |----------|------|
//! | macOS | `~/Library/Application Support/notes-client/` |
//! | Linux | `~/.local/share/notes-client/` |
//! | Windows | `C:\Users\<user>\AppData\Roaming\notes-client\` |

use std::path::{Path, PathBuf};

use crate::models::Session;
use crate::session_store::{SessionStore, SessionStoreError};

/// Filesystem-backed SessionStore for desktop persistence.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store the session at `<base>/<storage_key>.json`.
    pub fn new(base: &Path, storage_key: &str) -> Self {
        Self {
            path: base.join(format!("{storage_key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        // Readers never observe a partially written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BearerToken, UserInfo};

    fn temp_dir(suffix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "notes_client_session_{suffix}_{}",
            std::process::id()
        ))
    }

    fn session() -> Session {
        Session {
            token: BearerToken::new("tok-123"),
            user: UserInfo {
                id: "u1".to_string(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        }
    }

    #[test]
    fn test_file_session_store_roundtrip() {
        let dir = temp_dir("roundtrip");
        let _ = std::fs::remove_dir_all(&dir);

        let store = FileSessionStore::new(&dir, "auth-storage");
        assert!(store.load().unwrap().is_none());

        store.save(&session()).unwrap();
        assert!(dir.join("auth-storage.json").exists());

        // Re-open from same directory
        let reopened = FileSessionStore::new(&dir, "auth-storage");
        assert_eq!(reopened.load().unwrap(), Some(session()));

        reopened.clear().unwrap();
        assert!(reopened.load().unwrap().is_none());
        // Clearing twice is fine.
        reopened.clear().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = temp_dir("malformed");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("auth-storage.json"), "{not json").unwrap();

        let store = FileSessionStore::new(&dir, "auth-storage");
        assert!(matches!(
            store.load(),
            Err(SessionStoreError::Malformed(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
