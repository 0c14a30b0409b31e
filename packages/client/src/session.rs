//! # Session manager — who is signed in, and with which credential
//!
//! [`SessionManager`] owns the single active [`Session`] of a client instance.
//! It performs the sign-in, sign-up and verification exchanges, persists the
//! session through a [`SessionStore`], and runs the registered logout hooks
//! when the session ends.
//!
//! ## Lifecycle
//!
//! | Event | State |
//! |-------|-------|
//! | startup | empty |
//! | [`restore`](SessionManager::restore) | the persisted session, if any |
//! | [`sign_in`](SessionManager::sign_in) / [`sign_up`](SessionManager::sign_up) succeeds | the new session |
//! | sign-in as someone else while signed in | the new session, after the logout hooks ran |
//! | [`logout`](SessionManager::logout), or the server rejects the token | empty |
//!
//! Authentication exchanges are single-flight: while one is outstanding every
//! other call fails with [`SyncError::Busy`] without reaching the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use api::{SignInRequest, SignUpRequest, Transport, TransportError};
use store::{BearerToken, Session, SessionStore};

use crate::error::{SyncError, SyncResult};

/// Minimum accepted password length at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

type LogoutHook = Box<dyn Fn() + Send + Sync>;

pub struct SessionManager<T> {
    transport: Arc<T>,
    store: Arc<dyn SessionStore>,
    current: Mutex<Option<Session>>,
    busy: AtomicBool,
    hooks: Mutex<Vec<LogoutHook>>,
}

/// Clears the busy flag when the exchange ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Server rejections during sign-in or sign-up are credential problems.
fn auth_error(error: TransportError) -> SyncError {
    match error {
        TransportError::Unauthorized(detail)
        | TransportError::ValidationFailed(detail)
        | TransportError::NotFound(detail) => SyncError::Auth(detail),
        other => other.into(),
    }
}

impl<T: Transport> SessionManager<T> {
    pub fn new(transport: Arc<T>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            transport,
            store,
            current: Mutex::new(None),
            busy: AtomicBool::new(false),
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    fn current(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> SyncResult<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_| SyncError::Busy)
    }

    /// Load the persisted session, if any. A malformed or unreadable file is
    /// treated as signed out.
    pub fn restore(&self) -> Option<Session> {
        match self.store.load() {
            Ok(Some(session)) => {
                tracing::info!(user = %session.user.email, "restored persisted session");
                *self.current() = Some(session.clone());
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load persisted session: {}", e);
                None
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SyncResult<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SyncError::Validation(
                "email and password are required".to_string(),
            ));
        }
        let _busy = self.begin()?;

        let request = SignInRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let session = self.transport.sign_in(&request).await.map_err(auth_error)?;
        tracing::info!(user = %session.user.display_name(), "signed in");
        self.install(session.clone());
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> SyncResult<Session> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(SyncError::Validation(
                "name and email are required".to_string(),
            ));
        }
        if password != confirm_password {
            return Err(SyncError::Validation("passwords do not match".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SyncError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let _busy = self.begin()?;

        let request = SignUpRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let session = self.transport.sign_up(&request).await.map_err(auth_error)?;
        tracing::info!(user = %session.user.display_name(), "signed up");
        self.install(session.clone());
        Ok(session)
    }

    /// Check the stored token against the server and refresh the user
    /// profile. A rejected token ends the session.
    pub async fn verify(&self) -> SyncResult<Session> {
        let _busy = self.begin()?;
        let session = self.current_session().ok_or(SyncError::Unauthorized)?;

        match self.transport.current_user(&session.token).await {
            Ok(user) => {
                // The session may have ended or changed while the call was out.
                let refreshed = {
                    let mut current = self.current();
                    match current.as_mut() {
                        Some(active) if active.token == session.token => {
                            active.user = user;
                            Some(active.clone())
                        }
                        _ => None,
                    }
                };
                let refreshed = refreshed.ok_or(SyncError::Cancelled)?;
                self.persist(&refreshed);
                Ok(refreshed)
            }
            Err(TransportError::Unauthorized(detail)) => {
                tracing::info!("stored session rejected: {}", detail);
                self.expire(&session.token);
                Err(SyncError::Unauthorized)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// End the session: clear memory and storage, then run the logout hooks.
    pub fn logout(&self) {
        let previous = self.current().take();
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear persisted session: {}", e);
        }
        if let Some(session) = previous {
            tracing::info!(user = %session.user.display_name(), "logged out");
        }
        self.run_hooks();
    }

    fn run_hooks(&self) {
        let hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook();
        }
    }

    /// Log out only if `token` is still the active credential, so a stale
    /// rejection cannot end a newer session.
    /// Returns whether the session ended.
    pub(crate) fn expire(&self, token: &BearerToken) -> bool {
        let matches = self
            .current()
            .as_ref()
            .is_some_and(|session| &session.token == token);
        if matches {
            self.logout();
        } else {
            tracing::debug!("ignoring rejection of a superseded token");
        }
        matches
    }

    pub fn current_session(&self) -> Option<Session> {
        self.current().clone()
    }

    pub fn bearer(&self) -> Option<BearerToken> {
        self.current().as_ref().map(|session| session.token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    /// Register a callback run on every logout, after the session is cleared.
    /// It also runs when a sign-in replaces a different active session.
    pub fn on_logout(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Make `session` the active one. A different session it replaces is torn
    /// down through the logout hooks, so nothing of the previous user survives.
    fn install(&self, session: Session) {
        self.persist(&session);
        let token = session.token.clone();
        let previous = self.current().replace(session);
        if let Some(previous) = previous.filter(|previous| previous.token != token) {
            tracing::info!(user = %previous.user.display_name(), "replaced active session");
            self.run_hooks();
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(session) {
            tracing::warn!("Failed to persist session: {}", e);
        }
    }
}

impl<T> std::fmt::Debug for SessionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field(
                "current",
                &*self.current.lock().unwrap_or_else(PoisonError::into_inner),
            )
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
