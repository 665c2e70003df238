//! Request bodies for the managed engine's REST surface.
//!
//! # Protocol Overview
//!
//! A deployed agent exposes two methods under its resource name:
//!
//! ```text
//! POST {base}:query        {"class_method": "list_sessions", "input": {"user_id": "u"}}
//!                          -> {"output": {...}}
//! POST {base}:streamQuery  {"class_method": "stream_query",
//!                           "input": {"user_id": "u", "session_id": "s", "message": "hi"}}
//!                          -> one JSON event per line
//! ```
//!
//! `{base}` is `https://{location}-aiplatform.googleapis.com/v1/projects/{p}/locations/{l}/reasoningEngines/{id}`.

use serde::Serialize;
use serde_json::Value;

/// Methods of the deployed agent that can be invoked remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassMethod {
    CreateSession,
    ListSessions,
    GetSession,
    DeleteSession,
    StreamQuery,
}

impl ClassMethod {
    /// REST verb suffix the method is served under.
    pub fn endpoint(self) -> &'static str {
        match self {
            ClassMethod::StreamQuery => "streamQuery",
            _ => "query",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub class_method: ClassMethod,
    pub input: QueryInput<'a>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryInput<'a> {
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    /// Initial session state for `create_session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a Value>,
}
