//! Session and event records as the backends store them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp::RawTimestamp;

/// Backend-assigned, opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters, for compact listings.
    pub fn short(&self, len: usize) -> &str {
        match self.0.char_indices().nth(len) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Which adapter produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    LocalRest,
    AgentEngine,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::LocalRest => f.write_str("local"),
            BackendKind::AgentEngine => f.write_str("agent-engine"),
        }
    }
}

/// A backend-tracked conversation.
///
/// Never mutated in place; a fresh copy is fetched to observe changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    pub last_update_time: Option<RawTimestamp>,
    pub backend: BackendKind,
    /// Stored event log. Empty when the backend omitted it (list results).
    pub events: Vec<Event>,
}

/// Wire form of a session, accepting both camelCase and snake_case keys.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionRecord {
    #[serde(deserialize_with = "record_id")]
    pub id: String,
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default, alias = "lastUpdateTime")]
    pub last_update_time: Option<RawTimestamp>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub events: Vec<Event>,
}

impl SessionRecord {
    pub(crate) fn into_session(self, backend: BackendKind, requested_user: &str) -> Session {
        Session {
            id: SessionId(self.id),
            user_id: self.user_id.unwrap_or_else(|| requested_user.to_string()),
            last_update_time: self.last_update_time,
            backend,
            events: self.events,
        }
    }
}

/// One recorded or streamed turn fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RawTimestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub parts: Vec<Part>,
}

/// Content fragment. Only `text` is interpreted; other kinds of part
/// (function calls, inline data, ...) deserialize with `text: None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

impl Event {
    /// Convenience constructor for a single-part text event.
    pub fn text(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            content: Some(Content {
                role: None,
                parts: vec![Part::text(text)],
            }),
            ..Self::default()
        }
    }
}

/// Deserialize a sequence, dropping elements that do not fit `T`.
/// `null` is read as an empty sequence.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

/// Text of a wire id. Non-empty strings are taken as is and integers as
/// their decimal form; anything else is no id.
pub(crate) fn id_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn record_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    id_text(&raw).ok_or_else(|| serde::de::Error::custom(format!("unusable session id: {}", raw)))
}

/// Content that is not an object is treated as absent.
fn lenient_content<'de, D>(deserializer: D) -> Result<Option<Content>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}
