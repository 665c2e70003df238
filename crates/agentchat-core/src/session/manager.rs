//! SessionOrchestrator - one user's conversation against one backend.

use std::sync::Arc;

use serde_json::Value;

use super::model::{BackendKind, Event, Session, SessionId};
use super::state::ActiveSession;
use crate::backends::SessionTransport;
use crate::conversation::{message_from_event, reconstruct, Message, Speaker};
use crate::diagnostics::{Diagnostics, Level};
use crate::error::ChatError;

/// Owns the active-session state, the loaded session details, the displayed
/// history and the cached session list.
///
/// Created once per interaction and passed to whatever drives the display.
/// All calls block on the backend.
pub struct SessionOrchestrator {
    transport: Box<dyn SessionTransport>,
    diagnostics: Arc<Diagnostics>,
    user_id: String,
    state: ActiveSession,
    details: Option<Session>,
    history: Vec<Message>,
    sessions: Vec<Session>,
    refresh_sessions: bool,
}

impl SessionOrchestrator {
    pub fn new(transport: Box<dyn SessionTransport>, diagnostics: Arc<Diagnostics>, user_id: impl Into<String>) -> Self {
        Self {
            transport,
            diagnostics,
            user_id: user_id.into(),
            state: ActiveSession::None,
            details: None,
            history: Vec::new(),
            sessions: Vec::new(),
            refresh_sessions: true,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.transport.backend()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Switch user. Everything tied to the previous user is dropped.
    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        if user_id == self.user_id {
            return;
        }
        log::info!("Switching user from {} to {}", self.user_id, user_id);
        self.user_id = user_id;
        self.leave_session();
        self.sessions.clear();
        self.refresh_sessions = true;
    }

    pub fn active_session(&self) -> &ActiveSession {
        &self.state
    }

    /// Details of the active session, once loaded.
    pub fn details(&self) -> Option<&Session> {
        self.details.as_ref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// The session list, fetched again only if a refresh was requested.
    /// On failure the refresh stays pending.
    pub fn sessions(&mut self) -> Result<&[Session], ChatError> {
        if self.refresh_sessions {
            self.sessions = self.transport.list_sessions(&self.user_id)?;
            self.refresh_sessions = false;
            log::debug!("Loaded {} sessions for {}", self.sessions.len(), self.user_id);
        }
        Ok(&self.sessions)
    }

    /// Last fetched session list, without touching the backend.
    pub fn cached_sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn request_refresh(&mut self) {
        self.refresh_sessions = true;
    }

    /// Create a session and make it the active one.
    ///
    /// `Ok(None)` when the backend gave back no id; the state is unchanged.
    /// If the new session's details cannot be loaded the session is still
    /// active and the failure is published on the diagnostics bus.
    pub fn create_session(&mut self, seed: Option<&Value>) -> Result<Option<SessionId>, ChatError> {
        let Some(id) = self.transport.create_session(&self.user_id, seed)? else {
            return Ok(None);
        };

        self.enter(id.clone());
        self.refresh_sessions = true;
        if let Err(err) = self.reload() {
            self.diagnostics.report(Level::Error, &err);
        }
        Ok(Some(id))
    }

    /// Make `id` the active session and load its details.
    ///
    /// On error the session stays selected, but sending is refused until
    /// [`reload`](Self::reload) succeeds.
    pub fn select(&mut self, id: SessionId) -> Result<&Session, ChatError> {
        self.enter(id);
        self.reload()
    }

    /// Fetch the active session again and rebuild the history from its
    /// event log.
    pub fn reload(&mut self) -> Result<&Session, ChatError> {
        let id = self
            .state
            .id()
            .cloned()
            .ok_or_else(|| ChatError::Precondition("No active session".to_string()))?;

        match self.transport.get_session(&self.user_id, &id)? {
            Some(session) => {
                self.history = reconstruct(&session.events);
                let session: &Session = self.details.insert(session);
                Ok(session)
            }
            None => {
                self.details = None;
                self.history.clear();
                Err(ChatError::NotFound(id))
            }
        }
    }

    /// Delete a session. Returns whether the backend accepted the delete.
    pub fn delete_session(&mut self, id: &SessionId) -> Result<bool, ChatError> {
        if !self.transport.delete_session(&self.user_id, id)? {
            return Ok(false);
        }

        if self.state.on_deleted(id) {
            self.details = None;
            self.history.clear();
        }
        self.sessions.retain(|session| &session.id != id);
        self.refresh_sessions = true;
        Ok(true)
    }

    /// Send `text` in the active session and append the exchange to the
    /// history.
    ///
    /// Each message derived from the reply is passed to `on_message` as soon
    /// as its event arrives. Returns the messages appended by this call. If
    /// the stream breaks, the events received so far are still appended and
    /// the failure is returned.
    pub fn send_and_append<F>(&mut self, text: &str, mut on_message: F) -> Result<&[Message], ChatError>
    where
        F: FnMut(&Message),
    {
        let start = self.history.len();
        if text.trim().is_empty() {
            return Ok(&self.history[start..]);
        }

        let id = self.state.id().cloned().ok_or_else(|| {
            ChatError::Precondition("No active session. Create or select a session first.".to_string())
        })?;
        if self.details.is_none() {
            return Err(ChatError::Precondition(format!(
                "Details of session {} are not loaded. Reload or select it again.",
                id
            )));
        }

        self.history.push(Message::user(text));
        let stream = self.transport.send_message(&self.user_id, &id, text)?;

        let mut events: Vec<Event> = Vec::new();
        let mut failure = None;
        for item in stream {
            match item {
                Ok(event) => {
                    if let Some(message) = message_from_event(&event) {
                        on_message(&message);
                    }
                    events.push(event);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let replies = reconstruct(&events);
        let answered = replies.iter().any(|message| message.speaker() == Speaker::Assistant);
        self.history.extend(replies);
        self.refresh_sessions = true;

        if let Some(err) = failure {
            return Err(err);
        }
        if !answered {
            self.diagnostics.warn("No response received from the agent");
        }
        Ok(&self.history[start..])
    }

    fn enter(&mut self, id: SessionId) {
        self.leave_session();
        self.state.enter(id);
    }

    fn leave_session(&mut self) {
        self.state.clear();
        self.details = None;
        self.history.clear();
    }
}
