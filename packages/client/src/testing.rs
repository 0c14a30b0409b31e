//! Scripted in-memory transport for tests.
//!
//! Every call made through [`ScriptedTransport`] is parked until the test picks
//! it up with [`ScriptedTransport::next_call`] and answers it, so tests decide
//! the completion order of concurrent operations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api::{SignInRequest, SignUpRequest, Transport, TransportError, TransportResult};
use chrono::{Duration, TimeZone, Utc};
use store::{
    BearerToken, LocalCache, MemorySessionStore, Note, NoteDraft, NoteId, Session, UserInfo,
};
use tokio::sync::{oneshot, Notify};

use crate::engine::SyncEngine;
use crate::session::SessionManager;

#[derive(Debug, Clone)]
pub enum Request {
    SignUp(SignUpRequest),
    SignIn(SignInRequest),
    CurrentUser(BearerToken),
    ListNotes(BearerToken),
    GetNote(BearerToken, NoteId),
    CreateNote(BearerToken, NoteDraft),
    UpdateNote(BearerToken, NoteId, NoteDraft),
    DeleteNote(BearerToken, NoteId),
}

#[derive(Debug)]
pub enum Reply {
    Session(Session),
    User(UserInfo),
    Notes(Vec<Note>),
    Note(Note),
    Done,
    Fail(TransportError),
}

/// A parked transport call.
#[derive(Debug)]
pub struct Call {
    pub request: Request,
    reply: oneshot::Sender<Reply>,
}

impl Call {
    pub fn reply(self, reply: Reply) {
        let _ = self.reply.send(reply);
    }

    pub fn fail(self, error: TransportError) {
        self.reply(Reply::Fail(error));
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    parked: Mutex<VecDeque<Call>>,
    calls: AtomicUsize,
    arrived: Notify,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait for the next call that has not been picked up yet.
    pub async fn next_call(&self) -> Call {
        loop {
            if let Some(call) = self.parked.lock().unwrap().pop_front() {
                return call;
            }
            self.arrived.notified().await;
        }
    }

    async fn exchange(&self, request: Request) -> Reply {
        let (reply, answer) = oneshot::channel();
        self.parked.lock().unwrap().push_back(Call { request, reply });
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.arrived.notify_one();
        answer
            .await
            .unwrap_or_else(|_| Reply::Fail(TransportError::Network("call dropped".into())))
    }
}

fn unexpected<T>(reply: Reply) -> TransportResult<T> {
    match reply {
        Reply::Fail(error) => Err(error),
        other => panic!("unexpected scripted reply: {other:?}"),
    }
}

impl Transport for ScriptedTransport {
    async fn sign_up(&self, request: &SignUpRequest) -> TransportResult<Session> {
        match self.exchange(Request::SignUp(request.clone())).await {
            Reply::Session(session) => Ok(session),
            other => unexpected(other),
        }
    }

    async fn sign_in(&self, request: &SignInRequest) -> TransportResult<Session> {
        match self.exchange(Request::SignIn(request.clone())).await {
            Reply::Session(session) => Ok(session),
            other => unexpected(other),
        }
    }

    async fn current_user(&self, token: &BearerToken) -> TransportResult<UserInfo> {
        match self.exchange(Request::CurrentUser(token.clone())).await {
            Reply::User(user) => Ok(user),
            other => unexpected(other),
        }
    }

    async fn list_notes(&self, token: &BearerToken) -> TransportResult<Vec<Note>> {
        match self.exchange(Request::ListNotes(token.clone())).await {
            Reply::Notes(notes) => Ok(notes),
            other => unexpected(other),
        }
    }

    async fn get_note(&self, token: &BearerToken, id: &NoteId) -> TransportResult<Note> {
        match self.exchange(Request::GetNote(token.clone(), id.clone())).await {
            Reply::Note(note) => Ok(note),
            other => unexpected(other),
        }
    }

    async fn create_note(&self, token: &BearerToken, draft: &NoteDraft) -> TransportResult<Note> {
        match self
            .exchange(Request::CreateNote(token.clone(), draft.clone()))
            .await
        {
            Reply::Note(note) => Ok(note),
            other => unexpected(other),
        }
    }

    async fn update_note(
        &self,
        token: &BearerToken,
        id: &NoteId,
        draft: &NoteDraft,
    ) -> TransportResult<Note> {
        match self
            .exchange(Request::UpdateNote(token.clone(), id.clone(), draft.clone()))
            .await
        {
            Reply::Note(note) => Ok(note),
            other => unexpected(other),
        }
    }

    async fn delete_note(&self, token: &BearerToken, id: &NoteId) -> TransportResult<()> {
        match self.exchange(Request::DeleteNote(token.clone(), id.clone())).await {
            Reply::Done => Ok(()),
            other => unexpected(other),
        }
    }
}

pub fn session(token: &str, user_id: &str) -> Session {
    Session {
        token: BearerToken::new(token),
        user: UserInfo {
            id: user_id.to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        },
    }
}

/// A confirmed note with a fixed timestamp `minute` minutes into 2024.
pub fn note(id: &str, title: &str, minute: u32) -> Note {
    let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Note {
        id: NoteId::from(id),
        title: title.to_string(),
        content: format!("{title} body"),
        created_at,
        updated_at: created_at + Duration::minutes(i64::from(minute)),
        owner_id: "u1".to_string(),
    }
}

/// Server copy of `draft` applied to `id`.
pub fn confirmed(id: &str, draft: &NoteDraft, minute: u32) -> Note {
    Note {
        title: draft.title.clone(),
        content: draft.content.clone(),
        ..note(id, &draft.title, minute)
    }
}

/// Signed-in engine over a scripted transport, with `notes` already cached.
pub fn signed_in_engine(notes: Vec<Note>) -> (Arc<ScriptedTransport>, SyncEngine<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new());
    let store = MemorySessionStore::with_session(session("tok-1", "u1"));
    let manager = Arc::new(SessionManager::new(transport.clone(), Arc::new(store)));
    manager.restore();
    let cache = LocalCache::new();
    cache.replace_all(notes);
    (transport, SyncEngine::new(manager, cache))
}

/// Let every branch of a `join!` observe the replies sent so far.
pub async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[test]
fn test_note_minutes_roll_over_the_hour() {
    let late = note("n1", "Late", 70);
    assert_eq!(
        late.updated_at,
        Utc.with_ymd_and_hms(2024, 1, 1, 1, 10, 0).unwrap()
    );
    assert!(late.updated_at > note("n1", "Early", 59).updated_at);
}
