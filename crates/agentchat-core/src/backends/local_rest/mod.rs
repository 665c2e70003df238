//! Adapter for a locally running agent server.
//!
//! Plain JSON over HTTP for session bookkeeping, and a `data: `-framed
//! stream for replies. See [`types`] for the endpoint list.

mod types;

pub use types::{NewMessage, RunRequest};

use std::io::BufReader;
use std::sync::Arc;

use serde_json::{json, Value};

use super::{delete_outcome, path_segment, report_dropped, EventStream, SessionTransport, TransportOptions};
use crate::diagnostics::{Diagnostics, Level};
use crate::error::ChatError;
use crate::response::{decode_or_empty, send, send_buffered, ProbeReport, RawResponse, Sent};
use crate::session::{BackendKind, Session, SessionId};
use crate::shapes;
use crate::sse::SseReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRestConfig {
    pub base_url: String,
    pub app_name: String,
}

impl Default for LocalRestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            app_name: "greeting_agent".to_string(),
        }
    }
}

pub struct LocalRestTransport {
    config: LocalRestConfig,
    options: TransportOptions,
    agent: ureq::Agent,
    diagnostics: Arc<Diagnostics>,
}

impl LocalRestTransport {
    pub fn new(config: LocalRestConfig, options: TransportOptions, diagnostics: Arc<Diagnostics>) -> Self {
        let agent = options.agent();
        Self {
            config,
            options,
            agent,
            diagnostics,
        }
    }

    pub fn config(&self) -> &LocalRestConfig {
        &self.config
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn sessions_url(&self, user_id: &str) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions",
            self.base(),
            path_segment(&self.config.app_name),
            path_segment(user_id)
        )
    }

    fn session_url(&self, user_id: &str, session_id: &SessionId) -> String {
        format!("{}/{}", self.sessions_url(user_id), path_segment(session_id.as_str()))
    }

    /// Request with the JSON headers and no overall deadline.
    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json")
    }

    /// Request for a non-streaming call, bounded by the call timeout.
    fn call(&self, method: &str, url: &str) -> ureq::Request {
        self.request(method, url).timeout(self.options.call_timeout)
    }

    fn fetch(&self, method: &str, url: &str, body: Option<&Value>) -> Result<RawResponse, ChatError> {
        send_buffered(self.call(method, url), body)
    }

    /// `GET /list-apps`. Anything unreadable is an empty list.
    pub fn list_apps(&self) -> Result<Vec<String>, ChatError> {
        let raw = self.fetch("GET", &format!("{}/list-apps", self.base()), None)?;
        if !raw.is_success() {
            return Err(raw.backend_error());
        }
        let value = decode_or_empty(&raw, json!([]), &self.diagnostics);
        Ok(value
            .as_array()
            .map(|apps| apps.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// Raw, uninterpreted view of `GET /list-apps`, for checking what the
    /// server actually answers.
    pub fn probe(&self) -> Result<ProbeReport, ChatError> {
        let raw = self.fetch("GET", &format!("{}/list-apps", self.base()), None)?;
        Ok(ProbeReport::from(raw))
    }
}

impl SessionTransport for LocalRestTransport {
    fn backend(&self) -> BackendKind {
        BackendKind::LocalRest
    }

    fn create_session(&self, user_id: &str, seed: Option<&Value>) -> Result<Option<SessionId>, ChatError> {
        let body = seed.cloned().unwrap_or_else(|| json!({}));
        let raw = self.fetch("POST", &self.sessions_url(user_id), Some(&body))?;
        if !raw.is_success() {
            return Err(raw.backend_error());
        }

        let value = decode_or_empty(&raw, Value::Null, &self.diagnostics);
        match shapes::session_id(&value) {
            Ok(id) => {
                log::info!("Created session {} for {}", id, user_id);
                Ok(Some(id))
            }
            Err(err) => {
                self.diagnostics.report(Level::Warning, &err);
                Ok(None)
            }
        }
    }

    fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, ChatError> {
        let raw = self.fetch("GET", &self.sessions_url(user_id), None)?;
        if !raw.is_success() {
            return Err(raw.backend_error());
        }

        let value = decode_or_empty(&raw, json!([]), &self.diagnostics);
        let list = shapes::session_list(value, BackendKind::LocalRest, user_id);
        report_dropped(&self.diagnostics, list.dropped);
        Ok(list.sessions)
    }

    fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Option<Session>, ChatError> {
        let raw = self.fetch("GET", &self.session_url(user_id, session_id), None)?;
        if raw.status == 404 {
            log::debug!("Session {} not found", session_id);
            return Ok(None);
        }
        if !raw.is_success() {
            return Err(raw.backend_error());
        }

        let value = decode_or_empty(&raw, Value::Null, &self.diagnostics);
        Ok(shapes::session_object(value, BackendKind::LocalRest, user_id))
    }

    fn delete_session(&self, user_id: &str, session_id: &SessionId) -> Result<bool, ChatError> {
        let raw = self.fetch("DELETE", &self.session_url(user_id, session_id), None)?;
        Ok(delete_outcome(&raw, session_id, &self.diagnostics))
    }

    fn send_message(&self, user_id: &str, session_id: &SessionId, text: &str) -> Result<EventStream, ChatError> {
        let request = RunRequest {
            app_name: &self.config.app_name,
            user_id,
            session_id: session_id.as_str(),
            new_message: NewMessage::user(text),
            stream: true,
        };
        let body = serde_json::to_value(&request).map_err(|e| ChatError::ShapeMismatch(e.to_string()))?;
        let wire_log = self.options.wire_log(session_id, &body);

        let url = format!("{}/run_sse", self.base());
        let response = match send(self.request("POST", &url), Some(&body))? {
            Sent::Ok(response) => response,
            Sent::Status(raw) => return Err(raw.backend_error()),
        };

        let reader = BufReader::new(response.into_reader());
        let frames = SseReader::new(reader)
            .with_diagnostics(Arc::clone(&self.diagnostics))
            .with_wire_log(wire_log);
        Ok(EventStream::from_frames(frames, Arc::clone(&self.diagnostics)))
    }
}
