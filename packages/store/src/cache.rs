//! # Local note cache
//!
//! [`LocalCache`] is the client's ordered, in-memory mirror of the server's note
//! list. It has no network or persistence behaviour: the sync engine is its only
//! writer and the UI reads snapshots from it.
//!
//! ## Ordering
//!
//! The order is the one the server returned on the last full resynchronisation
//! ([`replace_all`](LocalCache::replace_all)), except that notes inserted by
//! [`upsert`](LocalCache::upsert) for an unknown identity are prepended.
//! Replacing an existing note keeps its position.
//!
//! ## Consistency
//!
//! Every method runs as a single critical section, so a reader never sees a
//! half-applied mutation. [`substitute`](LocalCache::substitute) uses this to
//! swap a provisional note for its confirmed copy without any intermediate
//! state that shows neither or both.
//!
//! Each mutation bumps a revision counter observable through
//! [`subscribe`](LocalCache::subscribe), which the UI can use to re-render.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::models::{Note, NoteId};

/// Where a note sat when it was removed: its index and its neighbours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub index: usize,
    pub previous: Option<NoteId>,
    pub next: Option<NoteId>,
}

/// Ordered in-memory mirror of the server's notes, keyed by identity.
#[derive(Clone, Debug)]
pub struct LocalCache {
    notes: Arc<Mutex<Vec<Note>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for LocalCache {
    fn default() -> Self {
        Self {
            notes: Arc::default(),
            revision: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all notes in display order.
    pub fn list(&self) -> Vec<Note> {
        self.notes().clone()
    }

    pub fn get(&self, id: &NoteId) -> Option<Note> {
        self.notes().iter().find(|note| &note.id == id).cloned()
    }

    /// Index of the note in display order.
    pub fn position(&self, id: &NoteId) -> Option<usize> {
        self.notes().iter().position(|note| &note.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes().is_empty()
    }

    /// Insert at the head if the identity is unknown, otherwise replace in place.
    pub fn upsert(&self, note: Note) {
        let mut notes = self.notes();
        match notes.iter().position(|n| n.id == note.id) {
            Some(index) => notes[index] = note,
            None => notes.insert(0, note),
        }
        self.bump(notes);
    }

    /// Replace a note in place. Returns `false` (and changes nothing) if the
    /// identity is not cached.
    pub fn replace_existing(&self, note: Note) -> bool {
        let mut notes = self.notes();
        let Some(index) = notes.iter().position(|n| n.id == note.id) else {
            return false;
        };
        notes[index] = note;
        self.bump(notes);
        true
    }

    /// Remove a note, returning where it was and what it held.
    pub fn remove(&self, id: &NoteId) -> Option<(Placement, Note)> {
        let mut notes = self.notes();
        let index = notes.iter().position(|n| &n.id == id)?;
        let placement = Placement {
            index,
            previous: index.checked_sub(1).map(|i| notes[i].id.clone()),
            next: notes.get(index + 1).map(|n| n.id.clone()),
        };
        let note = notes.remove(index);
        self.bump(notes);
        Some((placement, note))
    }

    /// Put a previously removed note back where it was.
    ///
    /// The note goes in front of its former successor, or after its former
    /// predecessor, whichever is still cached; otherwise at the recorded index
    /// (clamped to the current length). If the identity has reappeared
    /// meanwhile it is replaced in place instead.
    pub fn restore(&self, placement: &Placement, note: Note) {
        let mut notes = self.notes();
        if let Some(index) = notes.iter().position(|n| n.id == note.id) {
            notes[index] = note;
            self.bump(notes);
            return;
        }
        let anchored = |anchor: &Option<NoteId>| {
            anchor
                .as_ref()
                .and_then(|id| notes.iter().position(|n| &n.id == id))
        };
        let index = anchored(&placement.next)
            .or_else(|| anchored(&placement.previous).map(|i| i + 1))
            .unwrap_or(placement.index)
            .min(notes.len());
        notes.insert(index, note);
        self.bump(notes);
    }

    /// Swap the note stored under `provisional` for its confirmed copy.
    ///
    /// The confirmed note takes the provisional note's position. Any other
    /// entry already carrying the confirmed identity (e.g. brought in by a
    /// concurrent refresh) is dropped so identities stay unique. If the
    /// provisional note is gone this degrades to [`upsert`](Self::upsert).
    pub fn substitute(&self, provisional: &NoteId, note: Note) {
        let mut notes = self.notes();
        match notes.iter().position(|n| &n.id == provisional) {
            Some(_) => {
                notes.retain(|n| n.id != note.id || &n.id == provisional);
                if let Some(index) = notes.iter().position(|n| &n.id == provisional) {
                    notes[index] = note;
                }
            }
            None => match notes.iter().position(|n| n.id == note.id) {
                Some(index) => notes[index] = note,
                None => notes.insert(0, note),
            },
        }
        self.bump(notes);
    }

    /// Full resynchronisation from server truth. Duplicate identities keep
    /// their first occurrence.
    pub fn replace_all(&self, incoming: Vec<Note>) {
        let mut notes = self.notes();
        notes.clear();
        for note in incoming {
            if notes.iter().all(|n| n.id != note.id) {
                notes.push(note);
            }
        }
        self.bump(notes);
    }

    /// Drop every cached note.
    pub fn clear(&self) {
        let mut notes = self.notes();
        notes.clear();
        self.bump(notes);
    }

    /// Receiver that observes a new revision number after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision number.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn notes(&self) -> MutexGuard<'_, Vec<Note>> {
        self.notes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Bump while still holding the guard so revisions are ordered like writes.
    fn bump(&self, guard: MutexGuard<'_, Vec<Note>>) {
        self.revision.send_modify(|revision| *revision += 1);
        drop(guard);
    }
}
