//! Adapter for an agent deployed on the managed cloud engine.
//!
//! Session bookkeeping goes through `:query` with a `class_method`, replies
//! through `:streamQuery`. Every request is authorized with a bearer token
//! from a [`TokenProvider`].
//!
//! # Example Usage
//!
//! ```ignore
//! use agentchat_core::backends::{AgentEngineConfig, AgentEngineTransport, TransportOptions};
//!
//! let config = AgentEngineConfig {
//!     project_id: Some("my-project".into()),
//!     resource_id: "1234567890".into(),
//!     ..AgentEngineConfig::default()
//! };
//! let transport = AgentEngineTransport::new(config, TransportOptions::default(), diagnostics)?;
//! let sessions = transport.list_sessions("test_user")?;
//! ```

mod credentials;
mod types;

pub use credentials::{CommandToken, StaticToken, TokenProvider};
pub use types::{ClassMethod, QueryInput, QueryRequest};

use std::io::BufReader;
use std::sync::Arc;

use serde_json::{json, Value};

use super::{delete_outcome, report_dropped, EventStream, SessionTransport, TransportOptions};
use crate::diagnostics::{Diagnostics, Level};
use crate::error::ChatError;
use crate::response::{decode_or_empty, send, send_buffered, RawResponse, Sent};
use crate::session::{BackendKind, Session, SessionId};
use crate::shapes;
use crate::sse::SseReader;

pub const DEFAULT_LOCATION: &str = "europe-west4";
pub const DEFAULT_TOKEN_COMMAND: &str = "gcloud auth print-access-token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEngineConfig {
    /// Billing/quota project. Also completes a bare numeric resource id.
    pub project_id: Option<String>,
    pub location: String,
    /// Either a full `projects/.../reasoningEngines/{id}` name or the bare id.
    pub resource_id: String,
    /// Overrides `https://{location}-aiplatform.googleapis.com`.
    pub endpoint: Option<String>,
    /// Fixed token. When absent, `token_command` is run instead.
    pub access_token: Option<String>,
    pub token_command: String,
}

impl Default for AgentEngineConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: DEFAULT_LOCATION.to_string(),
            resource_id: String::new(),
            endpoint: None,
            access_token: None,
            token_command: DEFAULT_TOKEN_COMMAND.to_string(),
        }
    }
}

impl AgentEngineConfig {
    /// Fully qualified resource name of the deployed agent.
    pub fn resource_name(&self) -> Result<String, ChatError> {
        let resource = self.resource_id.trim().trim_matches('/');
        if resource.is_empty() {
            return Err(ChatError::Precondition("resource id is not configured".to_string()));
        }
        if resource.starts_with("projects/") {
            return Ok(resource.to_string());
        }
        match self.project_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(project) => Ok(format!(
                "projects/{}/locations/{}/reasoningEngines/{}",
                project, self.location, resource
            )),
            None => Err(ChatError::Precondition(
                "project id is required when the resource id is not a full resource name".to_string(),
            )),
        }
    }

    /// `{endpoint}/v1/{resource name}`.
    pub fn base_url(&self) -> Result<String, ChatError> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        };
        Ok(format!("{}/v1/{}", endpoint, self.resource_name()?))
    }

    fn token_provider(&self) -> Result<Box<dyn TokenProvider>, ChatError> {
        match &self.access_token {
            Some(token) => Ok(Box::new(StaticToken::new(token.clone()))),
            None => Ok(Box::new(CommandToken::new(&self.token_command)?)),
        }
    }
}

pub struct AgentEngineTransport {
    config: AgentEngineConfig,
    base_url: String,
    options: TransportOptions,
    agent: ureq::Agent,
    tokens: Box<dyn TokenProvider>,
    diagnostics: Arc<Diagnostics>,
}

impl AgentEngineTransport {
    pub fn new(
        config: AgentEngineConfig,
        options: TransportOptions,
        diagnostics: Arc<Diagnostics>,
    ) -> Result<Self, ChatError> {
        let base_url = config.base_url()?;
        let tokens = config.token_provider()?;
        let agent = options.agent();
        log::debug!("Agent engine at {}", base_url);
        Ok(Self {
            config,
            base_url,
            options,
            agent,
            tokens,
            diagnostics,
        })
    }

    /// Replace the token source.
    pub fn with_token_provider(mut self, tokens: Box<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn config(&self) -> &AgentEngineConfig {
        &self.config
    }

    fn url(&self, method: ClassMethod) -> String {
        format!("{}:{}", self.base_url, method.endpoint())
    }

    fn request(&self, method: ClassMethod) -> Result<ureq::Request, ChatError> {
        let token = self.tokens.token()?;
        let mut request = self
            .agent
            .post(&self.url(method))
            .set("Authorization", &format!("Bearer {}", token))
            .set("Content-Type", "application/json");
        if let Some(project) = &self.config.project_id {
            request = request.set("x-goog-user-project", project);
        }
        Ok(request)
    }

    fn body(method: ClassMethod, input: QueryInput<'_>) -> Result<Value, ChatError> {
        serde_json::to_value(QueryRequest {
            class_method: method,
            input,
        })
        .map_err(|e| ChatError::ShapeMismatch(e.to_string()))
    }

    /// Run a `:query` call and buffer the answer, whatever its status.
    fn query(&self, method: ClassMethod, input: QueryInput<'_>) -> Result<RawResponse, ChatError> {
        let body = Self::body(method, input)?;
        let request = self.request(method)?.timeout(self.options.call_timeout);
        let raw = send_buffered(request, Some(&body))?;
        self.check_auth(&raw);
        Ok(raw)
    }

    /// A rejected token is dropped so the next call fetches a fresh one.
    fn check_auth(&self, raw: &RawResponse) {
        if raw.status == 401 {
            log::warn!("Access token rejected, it will be refreshed on the next call");
            self.tokens.invalidate();
        }
    }

    /// Decoded `output` of a successful `:query` call.
    fn output(&self, raw: &RawResponse, on_empty: Value) -> Result<Value, ChatError> {
        if !raw.is_success() {
            return Err(raw.backend_error());
        }
        Ok(shapes::unwrap_output(decode_or_empty(raw, on_empty, &self.diagnostics)))
    }
}

impl SessionTransport for AgentEngineTransport {
    fn backend(&self) -> BackendKind {
        BackendKind::AgentEngine
    }

    fn create_session(&self, user_id: &str, seed: Option<&Value>) -> Result<Option<SessionId>, ChatError> {
        let raw = self.query(
            ClassMethod::CreateSession,
            QueryInput {
                user_id,
                state: seed,
                ..QueryInput::default()
            },
        )?;
        let value = self.output(&raw, Value::Null)?;

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
        let raw = self.query(
            ClassMethod::ListSessions,
            QueryInput {
                user_id,
                ..QueryInput::default()
            },
        )?;
        let value = self.output(&raw, json!([]))?;

        let list = shapes::session_list(value, BackendKind::AgentEngine, user_id);
        report_dropped(&self.diagnostics, list.dropped);
        Ok(list.sessions)
    }

    fn get_session(&self, user_id: &str, session_id: &SessionId) -> Result<Option<Session>, ChatError> {
        let raw = self.query(
            ClassMethod::GetSession,
            QueryInput {
                user_id,
                session_id: Some(session_id.as_str()),
                ..QueryInput::default()
            },
        )?;
        if raw.status == 404 {
            log::debug!("Session {} not found", session_id);
            return Ok(None);
        }
        let value = self.output(&raw, Value::Null)?;
        Ok(shapes::session_object(value, BackendKind::AgentEngine, user_id))
    }

    fn delete_session(&self, user_id: &str, session_id: &SessionId) -> Result<bool, ChatError> {
        let raw = self.query(
            ClassMethod::DeleteSession,
            QueryInput {
                user_id,
                session_id: Some(session_id.as_str()),
                ..QueryInput::default()
            },
        )?;
        Ok(delete_outcome(&raw, session_id, &self.diagnostics))
    }

    fn send_message(&self, user_id: &str, session_id: &SessionId, text: &str) -> Result<EventStream, ChatError> {
        let body = Self::body(
            ClassMethod::StreamQuery,
            QueryInput {
                user_id,
                session_id: Some(session_id.as_str()),
                message: Some(text),
                state: None,
            },
        )?;
        let wire_log = self.options.wire_log(session_id, &body);

        let response = match send(self.request(ClassMethod::StreamQuery)?, Some(&body))? {
            Sent::Ok(response) => response,
            Sent::Status(raw) => {
                self.check_auth(&raw);
                return Err(raw.backend_error());
            }
        };

        // One JSON event per line, no frame prefix.
        let reader = BufReader::new(response.into_reader());
        let frames = SseReader::with_prefix(reader, "")
            .with_diagnostics(Arc::clone(&self.diagnostics))
            .with_wire_log(wire_log);
        Ok(EventStream::from_frames(frames, Arc::clone(&self.diagnostics)))
    }
}
