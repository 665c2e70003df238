//! Backend adapters.
//!
//! Every backend is driven through the same [`SessionTransport`] operations.
//! Which implementation is used is decided once, from a [`BackendConfig`],
//! by [`connect`].
//!
//! ```text
//! SessionOrchestrator
//!     └─ Box<dyn SessionTransport>
//!          ├─ LocalRestTransport   (HTTP + `data: ` framed stream)
//!          └─ AgentEngineTransport (:query / :streamQuery + bearer token)
//! ```

pub mod agent_engine;
pub mod local_rest;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::diagnostics::{Diagnostic, Diagnostics, Level};
use crate::error::{ChatError, ErrorKind};
use crate::logging::{log_line, open_log_file, LogHandle};
use crate::response::{decode, RawResponse};
use crate::session::{BackendKind, Event, Session, SessionId};
use crate::sse::SseReader;

pub use agent_engine::{AgentEngineConfig, AgentEngineTransport};
pub use local_rest::{LocalRestConfig, LocalRestTransport};

/// The operations a backend must provide.
///
/// Transport, status and decode failures are caught inside the adapter and
/// come back as `Err(ChatError)` or, where an operation tolerates them, as
/// an absent/empty result plus a diagnostic.
pub trait SessionTransport: Send {
    fn backend(&self) -> BackendKind;

    /// Create a session, optionally seeded with initial state. `Ok(None)`
    /// when the backend answered without a usable id.
    fn create_session(&self, user_id: &str, seed: Option<&Value>) -> Result<Option<SessionId>, ChatError>;

    fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, ChatError>;

    /// Full session including its event log. `Ok(None)` when the backend
    /// does not know the session.
    fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Option<Session>, ChatError>;

    /// `Ok(false)` when the backend refused the delete.
    fn delete_session(&self, user_id: &str, session_id: &SessionId) -> Result<bool, ChatError>;

    /// Send one user message. The returned stream is lazy; nothing is read
    /// from the connection until it is iterated.
    fn send_message(&self, user_id: &str, session_id: &SessionId, text: &str) -> Result<EventStream, ChatError>;
}

/// Lazily decoded events of one streamed reply.
///
/// Ends after the first `Err`. Dropping it closes the connection.
pub struct EventStream {
    inner: Box<dyn Iterator<Item = Result<Event, ChatError>> + Send>,
}

impl EventStream {
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<Event, ChatError>> + Send + 'static,
    {
        Self { inner: Box::new(iter) }
    }

    /// Decode events from a framed stream. Frames that are not events are
    /// reported on `diagnostics` and skipped.
    pub fn from_frames<R>(frames: SseReader<R>, diagnostics: Arc<Diagnostics>) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self::new(frames.filter_map(move |frame| match frame {
            Ok(value) => event_from_frame(value, &diagnostics).map(Ok),
            Err(err) => Some(Err(err)),
        }))
    }

    /// A stream over events that are already in memory.
    pub fn once(events: Vec<Event>) -> Self {
        Self::new(events.into_iter().map(Ok))
    }
}

impl Iterator for EventStream {
    type Item = Result<Event, ChatError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

fn event_from_frame(value: Value, diagnostics: &Diagnostics) -> Option<Event> {
    // Agents report failures mid-stream as `{"error": "..."}` frames.
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        diagnostics.publish(Diagnostic {
            level: Level::Error,
            kind: Some(ErrorKind::Backend),
            message: format!("Agent reported an error: {}", message),
        });
        return None;
    }

    match serde_json::from_value::<Event>(value) {
        Ok(event) => Some(event),
        Err(err) => {
            diagnostics.publish(Diagnostic {
                level: Level::Warning,
                kind: Some(ErrorKind::ShapeMismatch),
                message: format!("Stream frame is not an event: {}", err),
            });
            None
        }
    }
}

/// Connection settings shared by all backends.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// Idle time allowed between reads; bounds each line of a stream.
    pub read_timeout: Duration,
    /// Overall limit for non-streaming calls.
    pub call_timeout: Duration,
    /// Directory for per-stream wire logs. `None` disables them.
    pub log_dir: Option<PathBuf>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(300),
            call_timeout: Duration::from_secs(60),
            log_dir: None,
        }
    }
}

impl TransportOptions {
    pub(crate) fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout_connect(self.connect_timeout)
            .timeout_read(self.read_timeout)
            .build()
    }

    /// Wire log for one streamed exchange, with the request body recorded.
    pub(crate) fn wire_log(&self, session_id: &SessionId, body: &Value) -> LogHandle {
        let handle = open_log_file(self.log_dir.as_deref(), &format!("stream-{}", session_id));
        log_line(&handle, "SEND", &body.to_string());
        handle
    }
}

/// Which backend to talk to.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    LocalRest(LocalRestConfig),
    AgentEngine(AgentEngineConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::LocalRest(_) => BackendKind::LocalRest,
            BackendConfig::AgentEngine(_) => BackendKind::AgentEngine,
        }
    }
}

/// Build the transport for `config`.
pub fn connect(
    config: BackendConfig,
    options: TransportOptions,
    diagnostics: Arc<Diagnostics>,
) -> Result<Box<dyn SessionTransport>, ChatError> {
    log::info!("Connecting to {} backend", config.kind());
    match config {
        BackendConfig::LocalRest(config) => Ok(Box::new(LocalRestTransport::new(config, options, diagnostics))),
        BackendConfig::AgentEngine(config) => Ok(Box::new(AgentEngineTransport::new(config, options, diagnostics)?)),
    }
}

/// Statuses that count as a successful delete.
const DELETE_OK: [u16; 3] = [200, 202, 204];

/// Interpret a delete response. A refusal is reported on `diagnostics`
/// with whatever the error body says.
pub(crate) fn delete_outcome(raw: &RawResponse, session_id: &SessionId, diagnostics: &Diagnostics) -> bool {
    if DELETE_OK.contains(&raw.status) {
        log::info!("Deleted session {}", session_id);
        return true;
    }

    let detail = match decode(raw) {
        Ok(Some(value)) => value.to_string(),
        _ => raw.snippet(),
    };
    diagnostics.publish(Diagnostic {
        level: Level::Error,
        kind: Some(ErrorKind::Backend),
        message: format!(
            "Could not delete session {} (status {}): {}",
            session_id, raw.status, detail
        ),
    });
    false
}

/// Percent-encode one URL path segment.
pub(crate) fn path_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Publish a warning for list entries that had to be dropped.
pub(crate) fn report_dropped(diagnostics: &Diagnostics, dropped: usize) {
    if dropped > 0 {
        diagnostics.publish(Diagnostic {
            level: Level::Warning,
            kind: Some(ErrorKind::ShapeMismatch),
            message: format!("Skipped {} session entries without an id", dropped),
        });
    }
}
