//! # Pending operations — per-identity serialisation of note mutations
//!
//! Every create, update and delete the sync engine dispatches is tracked here
//! from the moment it is submitted until its response has been applied (or
//! rolled back). At most one operation per note identity is *active*; later
//! intents for the same identity wait in FIFO order and are woken one at a
//! time as the active operation completes.
//!
//! ## Flights
//!
//! [`PendingTable::enter`] resolves to a [`Flight`] once the caller's
//! operation is the active one for its identity. The flight is the caller's
//! ticket:
//!
//! | Call | Effect |
//! |------|--------|
//! | [`Flight::key`] | Identity the operation runs against (follows renames) |
//! | [`Flight::apply_if_current`] | Runs a cache mutation only if the operation was not cancelled |
//! | [`Flight::finish`] | Completes the operation and hands the slot to the next waiter |
//! | `drop` | Same as `finish(None)`; a waiter that is dropped leaves the queue |
//!
//! A create is keyed under its provisional identity. Finishing it with the
//! server-assigned identity re-keys the queue, so an edit submitted while the
//! create was in flight runs against the confirmed note.
//!
//! ## Cancellation
//!
//! [`PendingTable::cancel_all`] forgets every operation and bumps the epoch.
//! Queued callers resolve with [`SyncError::Cancelled`]; in-flight callers
//! find their flight no longer current and discard their response.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use store::{NoteDraft, NoteId};
use tokio::sync::oneshot;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// A submitted mutation that has not been settled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub ticket: u64,
    /// Identity the operation targets; `None` for a create.
    pub target: Option<NoteId>,
    pub kind: OperationKind,
    /// Submitted title and content; `None` for a delete.
    pub payload: Option<NoteDraft>,
    pub submitted_at: DateTime<Utc>,
}

struct Waiter {
    operation: PendingOperation,
    wake: oneshot::Sender<NoteId>,
}

struct Slot {
    active: PendingOperation,
    waiting: VecDeque<Waiter>,
}

#[derive(Default)]
struct Table {
    next_ticket: u64,
    epoch: u64,
    slots: HashMap<NoteId, Slot>,
}

impl Table {
    /// Key of the slot whose active operation holds `ticket`.
    fn active_key(&self, ticket: u64) -> Option<NoteId> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.active.ticket == ticket)
            .map(|(key, _)| key.clone())
    }

    /// Complete the active operation under `key` and hand the slot to the
    /// next live waiter, re-keying it to `renamed` when given.
    fn complete(&mut self, key: &NoteId, renamed: Option<NoteId>) {
        let Some(slot) = self.slots.remove(key) else {
            return;
        };
        let next_key = renamed.unwrap_or_else(|| key.clone());
        let mut waiting = slot.waiting;
        for waiter in waiting.iter_mut() {
            if waiter.operation.target.is_some() {
                waiter.operation.target = Some(next_key.clone());
            }
        }

        // The confirmed identity may already have its own slot.
        if let Some(existing) = self.slots.get_mut(&next_key) {
            existing.waiting.extend(waiting);
            return;
        }

        while let Some(waiter) = waiting.pop_front() {
            let operation = waiter.operation;
            if waiter.wake.send(next_key.clone()).is_ok() {
                self.slots.insert(
                    next_key,
                    Slot {
                        active: operation,
                        waiting,
                    },
                );
                return;
            }
            tracing::debug!(ticket = operation.ticket, "skipping abandoned queued operation");
        }
    }

    fn forget_waiter(&mut self, ticket: u64) {
        for slot in self.slots.values_mut() {
            slot.waiting.retain(|w| w.operation.ticket != ticket);
        }
    }
}

/// Registry of in-flight and queued note mutations, shared by clones.
#[derive(Clone, Default)]
pub struct PendingTable {
    inner: Arc<Mutex<Table>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an operation under `key` and wait until it is the active one
    /// for that identity.
    ///
    /// Fails with [`SyncError::Cancelled`] if [`cancel_all`](Self::cancel_all)
    /// runs while the operation is queued.
    pub async fn enter(
        &self,
        key: NoteId,
        kind: OperationKind,
        payload: Option<NoteDraft>,
    ) -> SyncResult<Flight> {
        let (flight, wait) = {
            let mut table = self.table();
            table.next_ticket += 1;
            let ticket = table.next_ticket;
            let operation = PendingOperation {
                ticket,
                target: (kind != OperationKind::Create).then(|| key.clone()),
                kind,
                payload,
                submitted_at: Utc::now(),
            };
            let flight = Flight {
                table: self.clone(),
                key: key.clone(),
                ticket,
                epoch: table.epoch,
                released: false,
            };

            match table.slots.get_mut(&key) {
                None => {
                    table.slots.insert(
                        key,
                        Slot {
                            active: operation,
                            waiting: VecDeque::new(),
                        },
                    );
                    (flight, None)
                }
                Some(slot) => {
                    let (wake, wait) = oneshot::channel();
                    tracing::debug!(ticket, note = %key, "queued behind pending operation");
                    slot.waiting.push_back(Waiter { operation, wake });
                    (flight, Some(wait))
                }
            }
        };

        let mut flight = flight;
        if let Some(wait) = wait {
            // A dropped sender means the queue was cancelled.
            flight.key = wait.await.map_err(|_| SyncError::Cancelled)?;
        }
        Ok(flight)
    }

    /// Counter bumped by every [`cancel_all`](Self::cancel_all).
    pub fn epoch(&self) -> u64 {
        self.table().epoch
    }

    /// Run `apply` unless [`cancel_all`](Self::cancel_all) ran since `epoch`
    /// was read. Returns `None` when the result is stale.
    pub fn apply_in_epoch<R>(&self, epoch: u64, apply: impl FnOnce() -> R) -> Option<R> {
        let table = self.table();
        if table.epoch != epoch {
            return None;
        }
        Some(apply())
    }

    /// Like [`apply_in_epoch`](Self::apply_in_epoch), but skips `apply` when
    /// an operation is tracked for `id`. Returns whether `apply` ran, or
    /// `None` when the result is stale.
    pub fn apply_if_untracked(&self, epoch: u64, id: &NoteId, apply: impl FnOnce()) -> Option<bool> {
        let table = self.table();
        if table.epoch != epoch {
            return None;
        }
        let tracked = table.slots.contains_key(id)
            || table
                .slots
                .values()
                .any(|slot| slot.active.target.as_ref() == Some(id));
        if tracked {
            return Some(false);
        }
        apply();
        Some(true)
    }

    /// Forget every operation. Queued callers resolve with
    /// [`SyncError::Cancelled`]; in-flight responses are discarded.
    pub fn cancel_all(&self) {
        let mut table = self.table();
        let dropped: usize = table.slots.values().map(|s| 1 + s.waiting.len()).sum();
        table.slots.clear();
        table.epoch += 1;
        tracing::debug!(dropped, epoch = table.epoch, "cancelled pending operations");
    }

    /// Whether an operation (active or queued) is tracked under `key`.
    pub fn contains(&self, key: &NoteId) -> bool {
        self.table().slots.contains_key(key)
    }

    /// Number of tracked operations, active and queued.
    pub fn len(&self) -> usize {
        self.table()
            .slots
            .values()
            .map(|slot| 1 + slot.waiting.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table().slots.is_empty()
    }

    /// Snapshot of tracked operations in submission order.
    pub fn operations(&self) -> Vec<PendingOperation> {
        let table = self.table();
        let mut operations: Vec<PendingOperation> = table
            .slots
            .values()
            .flat_map(|slot| {
                std::iter::once(slot.active.clone())
                    .chain(slot.waiting.iter().map(|w| w.operation.clone()))
            })
            .collect();
        operations.sort_by_key(|op| op.ticket);
        operations
    }
}

impl std::fmt::Debug for PendingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table();
        f.debug_struct("PendingTable")
            .field("epoch", &table.epoch)
            .field("slots", &table.slots.len())
            .finish()
    }
}

/// The caller's hold on the active operation for one identity.
#[derive(Debug)]
pub struct Flight {
    table: PendingTable,
    key: NoteId,
    ticket: u64,
    epoch: u64,
    released: bool,
}

impl Flight {
    /// Identity the operation runs against.
    pub fn key(&self) -> &NoteId {
        &self.key
    }

    /// Whether the operation is still tracked as active.
    pub fn is_current(&self) -> bool {
        let table = self.table.table();
        table.epoch == self.epoch && table.active_key(self.ticket).is_some()
    }

    /// Run `apply` while the operation is still current, atomically with
    /// respect to [`PendingTable::cancel_all`]. Returns `None` otherwise.
    pub fn apply_if_current<R>(&self, apply: impl FnOnce() -> R) -> Option<R> {
        let table = self.table.table();
        if table.epoch != self.epoch || table.active_key(self.ticket).is_none() {
            return None;
        }
        Some(apply())
    }

    /// Complete the operation. `renamed` carries the server-assigned identity
    /// of a confirmed create; queued intents follow it.
    pub fn finish(mut self, renamed: Option<NoteId>) {
        self.release(renamed);
    }

    fn release(&mut self, renamed: Option<NoteId>) {
        if self.released {
            return;
        }
        self.released = true;
        let mut table = self.table.table();
        match table.active_key(self.ticket) {
            Some(key) => table.complete(&key, renamed),
            None => table.forget_waiter(self.ticket),
        }
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.release(None);
    }
}
