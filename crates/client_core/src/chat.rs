//! Session/conversation controller.
//!
//! Tracks the displayed session list, the single active session and the
//! visible transcript. A reply is only rendered into the transcript that was
//! on screen when its message was dispatched; anything resolving after a
//! session switch is dropped.

use std::{collections::HashSet, sync::Arc};

use serde_json::Value;
use shared::{
    domain::{Role, SessionId},
    protocol::{session_path, sessions_path, RunRequest, RunResponse, Session, RUN_PATH},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, FetchFailure, Result},
    remote::{json_body, RemoteAccess},
};

pub const NO_RESPONSE_PLACEHOLDER: &str = "No response received";
pub const ERROR_PLACEHOLDER: &str = "Sorry, there was an error.";

/// Agent/user pair the sessions belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatIdentity {
    pub app_name: String,
    pub user_id: String,
}

impl Default for ChatIdentity {
    fn default() -> Self {
        Self {
            app_name: "agent".into(),
            user_id: "user".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Blank input; nothing was sent.
    Skipped,
    Answered,
    /// The exchange failed and a placeholder was rendered instead.
    Failed,
    /// The transcript changed before the exchange resolved.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionListView {
    pub sessions: Vec<SessionId>,
    pub active: Option<SessionId>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    SessionsRendered(SessionListView),
    TranscriptCleared { active: Option<SessionId> },
    MessageAppended { session_id: SessionId, message: Message },
    SendStateChanged(SendState),
    ReplyDiscarded { session_id: SessionId },
    Error(String),
}

struct SessionState {
    sessions: Vec<SessionId>,
    active: Option<SessionId>,
    list_error: Option<String>,
    transcript: Vec<Message>,
    /// Bumped whenever the visible transcript is replaced.
    transcript_epoch: u64,
    /// Bumped by every listing and by every local change to the collection.
    list_seq: u64,
    in_flight: HashSet<SessionId>,
}

impl SessionState {
    fn list_view(&self) -> SessionListView {
        SessionListView {
            sessions: self.sessions.clone(),
            active: self.active.clone(),
            error: self.list_error.clone(),
        }
    }

    fn send_state(&self) -> SendState {
        match &self.active {
            Some(active) if self.in_flight.contains(active) => SendState::Sending,
            _ => SendState::Idle,
        }
    }

    fn reset_transcript(&mut self) {
        self.transcript.clear();
        self.transcript_epoch += 1;
    }
}

pub struct SessionController {
    remote: Arc<dyn RemoteAccess>,
    identity: ChatIdentity,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<ChatEvent>,
}

impl SessionController {
    pub fn new(remote: Arc<dyn RemoteAccess>, identity: ChatIdentity) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            remote,
            identity,
            inner: Mutex::new(SessionState {
                sessions: Vec::new(),
                active: None,
                list_error: None,
                transcript: Vec::new(),
                transcript_epoch: 0,
                list_seq: 0,
                in_flight: HashSet::new(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub async fn sessions(&self) -> SessionListView {
        self.inner.lock().await.list_view()
    }

    pub async fn active_session(&self) -> Option<SessionId> {
        self.inner.lock().await.active.clone()
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.inner.lock().await.transcript.clone()
    }

    pub async fn send_state(&self) -> SendState {
        self.inner.lock().await.send_state()
    }

    /// Whether the input should accept a new message right now.
    pub async fn can_send(&self) -> bool {
        let guard = self.inner.lock().await;
        guard.active.is_some() && guard.send_state() == SendState::Idle
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }

    fn sessions_path(&self) -> String {
        sessions_path(&self.identity.app_name, &self.identity.user_id)
    }

    /// Replaces the displayed collection with the server's. A listing that
    /// was issued before a newer listing, a create or a delete completed is
    /// not rendered.
    pub async fn list_sessions(&self) -> Result<SessionListView> {
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.list_seq += 1;
            guard.list_seq
        };
        let path = self.sessions_path();
        let outcome = self
            .remote
            .get(&path)
            .await
            .and_then(|body| decode_sessions(&path, body));

        let mut guard = self.inner.lock().await;
        if guard.list_seq != seq {
            debug!(seq, latest = guard.list_seq, "chat: dropping superseded session list");
            let view = guard.list_view();
            return outcome.map(|_| view).map_err(ClientError::from);
        }
        let previous_active = guard.active.clone();
        let result = match outcome {
            Ok(sessions) => {
                info!(count = sessions.len(), "chat: sessions loaded");
                guard.sessions = sessions.into_iter().map(|session| session.id).collect();
                guard.active = guard.sessions.first().cloned();
                guard.list_error = None;
                Ok(guard.list_view())
            }
            Err(failure) => {
                warn!(error = %failure, "chat: failed to list sessions");
                guard.sessions.clear();
                guard.active = None;
                guard.list_error = Some(failure.to_string());
                Err(failure)
            }
        };

        let cleared = guard.active != previous_active;
        if cleared {
            guard.reset_transcript();
        }
        let view = guard.list_view();
        let active = guard.active.clone();
        drop(guard);

        if cleared {
            self.emit(ChatEvent::TranscriptCleared { active });
        }
        self.emit(ChatEvent::SessionsRendered(view));
        result.map_err(|failure| {
            self.emit(ChatEvent::Error(failure.to_string()));
            failure.into()
        })
    }

    pub async fn create_session(&self) -> Result<SessionId> {
        let path = self.sessions_path();
        let session = match self
            .remote
            .post(&path, None)
            .await
            .and_then(|body| decode_session(&path, body))
        {
            Ok(session) => session,
            Err(failure) => {
                warn!(error = %failure, "chat: failed to create session");
                self.emit(ChatEvent::Error(failure.to_string()));
                return Err(failure.into());
            }
        };

        let view = {
            let mut guard = self.inner.lock().await;
            if !guard.sessions.contains(&session.id) {
                guard.sessions.push(session.id.clone());
            }
            guard.active = Some(session.id.clone());
            guard.list_error = None;
            guard.list_seq += 1;
            guard.reset_transcript();
            guard.list_view()
        };
        info!(session_id = %session.id, "chat: session created");
        self.emit(ChatEvent::TranscriptCleared {
            active: Some(session.id.clone()),
        });
        self.emit(ChatEvent::SessionsRendered(view));
        Ok(session.id)
    }

    /// Local switch; no network call. The transcript of the newly selected
    /// session starts empty.
    pub async fn select_session(&self, session_id: &SessionId) -> Result<()> {
        let view = {
            let mut guard = self.inner.lock().await;
            if !guard.sessions.contains(session_id) {
                return Err(ClientError::UnknownSession(session_id.clone()));
            }
            guard.active = Some(session_id.clone());
            guard.reset_transcript();
            guard.list_view()
        };
        debug!(%session_id, "chat: session selected");
        self.emit(ChatEvent::TranscriptCleared {
            active: Some(session_id.clone()),
        });
        self.emit(ChatEvent::SessionsRendered(view));
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let path = session_path(&self.identity.app_name, &self.identity.user_id, session_id);
        if let Err(failure) = self.remote.delete(&path).await {
            warn!(%session_id, error = %failure, "chat: failed to delete session");
            self.emit(ChatEvent::Error(failure.to_string()));
            return Err(failure.into());
        }

        let (view, cleared) = {
            let mut guard = self.inner.lock().await;
            guard.sessions.retain(|id| id != session_id);
            guard.list_seq += 1;
            let cleared = guard.active.as_ref() == Some(session_id);
            if cleared {
                guard.active = guard.sessions.first().cloned();
                guard.reset_transcript();
            }
            (guard.list_view(), cleared)
        };
        info!(%session_id, "chat: session deleted");
        if cleared {
            self.emit(ChatEvent::TranscriptCleared {
                active: view.active.clone(),
            });
        }
        self.emit(ChatEvent::SessionsRendered(view));
        Ok(())
    }

    /// Sends `text` to the active session. The user's message is shown
    /// immediately and stays even if the exchange fails.
    pub async fn dispatch(&self, text: &str) -> Result<DispatchOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(DispatchOutcome::Skipped);
        }

        let (session_id, epoch) = {
            let mut guard = self.inner.lock().await;
            let Some(session_id) = guard.active.clone() else {
                return Err(ClientError::NoActiveSession);
            };
            if guard.in_flight.contains(&session_id) {
                return Err(ClientError::SendInFlight(session_id));
            }
            guard.in_flight.insert(session_id.clone());
            guard.transcript.push(Message::user(text));
            (session_id, guard.transcript_epoch)
        };
        self.emit(ChatEvent::MessageAppended {
            session_id: session_id.clone(),
            message: Message::user(text),
        });
        self.emit(ChatEvent::SendStateChanged(SendState::Sending));

        let request = RunRequest::user_text(
            self.identity.app_name.clone(),
            self.identity.user_id.clone(),
            session_id.clone(),
            text,
        );
        let exchange = match json_body("POST", RUN_PATH, &request) {
            Ok(body) => self.remote.post(RUN_PATH, Some(body)).await,
            Err(failure) => Err(failure),
        };
        let (reply, outcome) = match exchange {
            Ok(body) => match reply_text(body) {
                Some(reply) => (Message::model(reply), DispatchOutcome::Answered),
                None => {
                    warn!(%session_id, "chat: reply carried no text");
                    (Message::model(NO_RESPONSE_PLACEHOLDER), DispatchOutcome::Failed)
                }
            },
            Err(failure) => {
                warn!(%session_id, error = %failure, "chat: exchange failed");
                self.emit(ChatEvent::Error(failure.to_string()));
                (Message::model(ERROR_PLACEHOLDER), DispatchOutcome::Failed)
            }
        };

        let (outcome, send_state) = {
            let mut guard = self.inner.lock().await;
            guard.in_flight.remove(&session_id);
            let still_showing = guard.active.as_ref() == Some(&session_id)
                && guard.transcript_epoch == epoch;
            let outcome = if still_showing {
                guard.transcript.push(reply.clone());
                outcome
            } else {
                DispatchOutcome::Discarded
            };
            (outcome, guard.send_state())
        };

        if outcome == DispatchOutcome::Discarded {
            debug!(%session_id, "chat: reply arrived after session switch; dropped");
            self.emit(ChatEvent::ReplyDiscarded { session_id });
        } else {
            self.emit(ChatEvent::MessageAppended {
                session_id,
                message: reply,
            });
        }
        self.emit(ChatEvent::SendStateChanged(send_state));
        Ok(outcome)
    }
}

fn reply_text(body: Value) -> Option<String> {
    let response = serde_json::from_value::<RunResponse>(body).ok()?;
    response.first_text().map(str::to_owned)
}

fn decode_sessions(path: &str, body: Value) -> Result<Vec<Session>, FetchFailure> {
    serde_json::from_value(body)
        .map_err(|err| FetchFailure::new("GET", path, format!("malformed session list: {err}")))
}

fn decode_session(path: &str, body: Value) -> Result<Session, FetchFailure> {
    serde_json::from_value(body)
        .map_err(|err| FetchFailure::new("POST", path, format!("malformed session: {err}")))
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
