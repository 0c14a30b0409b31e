//! # Sync engine — optimistic note mutations over the transport
//!
//! [`SyncEngine`] is the only writer of the [`LocalCache`]. Every mutation
//! follows the same shape:
//!
//! 1. validate locally and check for a session (no transport call otherwise)
//! 2. wait for the identity's turn in the [`PendingTable`]
//! 3. snapshot the affected note and apply the optimistic change
//! 4. call the transport
//! 5. reconcile with the server's copy, or roll back to the snapshot
//!
//! Step 5 only happens while the operation is still tracked. After
//! [`cancel_all`](SyncEngine::cancel_all) (and therefore after a logout) late
//! responses are discarded and their callers get [`SyncError::Cancelled`].
//!
//! A transport `Unauthorized` ends the session instead of rolling back: the
//! logout hook registered by [`SyncEngine::new`] cancels every pending
//! operation and empties the cache.
//!
//! ## Refresh races
//!
//! [`refresh`](SyncEngine::refresh) replaces the whole cache with the server's
//! list when it lands. It does not wait for in-flight mutations, so whichever
//! of the two is applied last wins.

use std::sync::Arc;

use api::{Transport, TransportError};
use chrono::Utc;
use store::{BearerToken, LocalCache, Note, NoteDraft, NoteId};
use tokio::sync::watch;

use crate::error::{SyncError, SyncResult};
use crate::pending::{Flight, OperationKind, PendingOperation, PendingTable};
use crate::session::SessionManager;

pub struct SyncEngine<T> {
    transport: Arc<T>,
    session: Arc<SessionManager<T>>,
    cache: LocalCache,
    pending: PendingTable,
}

/// Server copy of a note, never older than the cached version it replaces.
fn reconciled(mut confirmed: Note, prior: &Note) -> Note {
    if confirmed.updated_at < prior.updated_at {
        confirmed.updated_at = prior.updated_at;
    }
    confirmed
}

fn validated(title: &str, content: &str) -> SyncResult<NoteDraft> {
    let draft = NoteDraft::new(title, content);
    draft
        .validate()
        .map_err(|reason| SyncError::Validation(reason.to_string()))?;
    Ok(draft)
}

fn discarded(what: &str, id: &NoteId) -> SyncError {
    tracing::debug!(note = %id, "discarding late {} response", what);
    SyncError::Cancelled
}

impl<T: Transport> SyncEngine<T> {
    /// Build an engine over `cache` and register its logout hook with the
    /// session manager.
    pub fn new(session: Arc<SessionManager<T>>, cache: LocalCache) -> Self {
        let pending = PendingTable::new();
        let hook_pending = pending.clone();
        let hook_cache = cache.clone();
        session.on_logout(move || {
            hook_pending.cancel_all();
            hook_cache.clear();
        });

        Self {
            transport: session.transport().clone(),
            session,
            cache,
            pending,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager<T>> {
        &self.session
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Snapshot of the cached notes in display order.
    pub fn notes(&self) -> Vec<Note> {
        self.cache.list()
    }

    /// Operations submitted and not yet settled, in submission order.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.pending.operations()
    }

    /// Revision counter bumped on every cache mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cache.subscribe()
    }

    fn bearer(&self) -> SyncResult<BearerToken> {
        self.session.bearer().ok_or(SyncError::Unauthorized)
    }

    /// Settle a failed mutation: a token rejection ends the session, anything
    /// else runs `rollback` if the operation is still current.
    fn settle_failure(
        &self,
        flight: &Flight,
        token: &BearerToken,
        error: TransportError,
        what: &str,
        rollback: impl FnOnce(),
    ) -> SyncError {
        if !flight.is_current() {
            return discarded(what, flight.key());
        }
        if error.is_unauthorized() && self.session.expire(token) {
            return SyncError::Unauthorized;
        }
        match flight.apply_if_current(rollback) {
            Some(()) => {
                tracing::warn!(note = %flight.key(), error = %error, "{} failed, rolled back", what);
                error.into()
            }
            None => discarded(what, flight.key()),
        }
    }

    /// Replace the cache with the server's note list.
    ///
    /// On failure the cache is left as it was and the cause is wrapped in
    /// [`SyncError::RefreshFailed`].
    pub async fn refresh(&self) -> SyncResult<Vec<Note>> {
        let token = self.bearer()?;
        let epoch = self.pending.epoch();

        match self.transport.list_notes(&token).await {
            Ok(notes) => {
                let count = notes.len();
                self.pending
                    .apply_in_epoch(epoch, || self.cache.replace_all(notes))
                    .ok_or_else(|| {
                        tracing::debug!("discarding late refresh response");
                        SyncError::Cancelled
                    })?;
                tracing::debug!(count, "notes refreshed");
                Ok(self.cache.list())
            }
            Err(error) => {
                if self.pending.epoch() != epoch {
                    tracing::debug!("discarding late refresh failure");
                    return Err(SyncError::Cancelled);
                }
                if error.is_unauthorized() {
                    self.session.expire(&token);
                }
                tracing::warn!(error = %error, "refresh failed");
                Err(SyncError::RefreshFailed(Box::new(error.into())))
            }
        }
    }

    /// Create a note, showing it immediately under a provisional identity.
    pub async fn create_note(&self, title: &str, content: &str) -> SyncResult<Note> {
        let draft = validated(title, content)?;
        let session = self.session.current_session().ok_or(SyncError::Unauthorized)?;

        let provisional = Note::provisional(&draft, session.user.id.clone(), Utc::now());
        let flight = self
            .pending
            .enter(provisional.id.clone(), OperationKind::Create, Some(draft.clone()))
            .await?;
        flight
            .apply_if_current(|| self.cache.upsert(provisional.clone()))
            .ok_or(SyncError::Cancelled)?;
        tracing::debug!(note = %provisional.id, "optimistic create");

        match self.transport.create_note(&session.token, &draft).await {
            Ok(confirmed) => {
                flight
                    .apply_if_current(|| self.cache.substitute(&provisional.id, confirmed.clone()))
                    .ok_or_else(|| discarded("create", &provisional.id))?;
                tracing::info!(note = %confirmed.id, "note created");
                flight.finish(Some(confirmed.id.clone()));
                Ok(confirmed)
            }
            Err(error) => Err(self.settle_failure(&flight, &session.token, error, "create", || {
                self.cache.remove(&provisional.id);
            })),
        }
    }

    /// Edit a note. Waits for any earlier operation on the same note.
    pub async fn update_note(&self, id: &NoteId, title: &str, content: &str) -> SyncResult<Note> {
        let draft = validated(title, content)?;
        self.bearer()?;

        let flight = self
            .pending
            .enter(id.clone(), OperationKind::Update, Some(draft.clone()))
            .await?;
        let id = flight.key().clone();
        let token = self.bearer()?;

        let prior = flight
            .apply_if_current(|| {
                let prior = self.cache.get(&id)?;
                self.cache.replace_existing(prior.edited(&draft, Utc::now()));
                Some(prior)
            })
            .ok_or(SyncError::Cancelled)?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        tracing::debug!(note = %id, "optimistic update");

        match self.transport.update_note(&token, &id, &draft).await {
            Ok(confirmed) => {
                let confirmed = reconciled(confirmed, &prior);
                flight
                    .apply_if_current(|| self.cache.upsert(confirmed.clone()))
                    .ok_or_else(|| discarded("update", &id))?;
                tracing::info!(note = %id, "note updated");
                flight.finish(None);
                Ok(confirmed)
            }
            Err(error) => Err(self.settle_failure(&flight, &token, error, "update", || {
                self.cache.replace_existing(prior);
            })),
        }
    }

    /// Delete a note. Waits for any earlier operation on the same note.
    pub async fn delete_note(&self, id: &NoteId) -> SyncResult<()> {
        self.bearer()?;

        let flight = self.pending.enter(id.clone(), OperationKind::Delete, None).await?;
        let id = flight.key().clone();
        let token = self.bearer()?;

        let (placement, prior) = flight
            .apply_if_current(|| self.cache.remove(&id))
            .ok_or(SyncError::Cancelled)?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        tracing::debug!(note = %id, "optimistic delete");

        match self.transport.delete_note(&token, &id).await {
            Ok(()) => {
                flight
                    .apply_if_current(|| ())
                    .ok_or_else(|| discarded("delete", &id))?;
                tracing::info!(note = %id, "note deleted");
                flight.finish(None);
                Ok(())
            }
            Err(error) => Err(self.settle_failure(&flight, &token, error, "delete", || {
                self.cache.restore(&placement, prior);
            })),
        }
    }

    /// Reload one note from the server.
    ///
    /// The server copy replaces the cached one (or is prepended); a note the
    /// server no longer has is dropped from the cache. Nothing is applied
    /// while a mutation of the same note is pending. An applied copy keeps the
    /// cached `updated_at` if the server's is older.
    pub async fn fetch_note(&self, id: &NoteId) -> SyncResult<Note> {
        let token = self.bearer()?;
        let epoch = self.pending.epoch();

        match self.transport.get_note(&token, id).await {
            Ok(note) => {
                let mut stored = None;
                let applied = self
                    .pending
                    .apply_if_untracked(epoch, id, || {
                        let fresh = match self.cache.get(id) {
                            Some(cached) => reconciled(note.clone(), &cached),
                            None => note.clone(),
                        };
                        self.cache.upsert(fresh.clone());
                        stored = Some(fresh);
                    })
                    .ok_or_else(|| discarded("fetch", id))?;
                if !applied {
                    tracing::debug!(note = %id, "note has a pending operation, fetched copy not applied");
                }
                Ok(stored.unwrap_or(note))
            }
            Err(TransportError::NotFound(detail)) => {
                self.pending
                    .apply_if_untracked(epoch, id, || {
                        self.cache.remove(id);
                    })
                    .ok_or_else(|| discarded("fetch", id))?;
                Err(SyncError::NotFound(detail))
            }
            Err(error) => {
                if self.pending.epoch() != epoch {
                    return Err(discarded("fetch", id));
                }
                if error.is_unauthorized() {
                    self.session.expire(&token);
                }
                Err(error.into())
            }
        }
    }

    /// Forget every pending and queued operation without rolling back.
    /// Responses that arrive later are discarded.
    pub fn cancel_all(&self) {
        self.pending.cancel_all();
    }

    /// End the session; the cache is emptied and pending work cancelled.
    pub fn logout(&self) {
        self.session.logout();
    }
}

impl<T> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("cache", &self.cache)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
