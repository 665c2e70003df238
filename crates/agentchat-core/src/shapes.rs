//! Per-operation response shape decoders.
//!
//! The backends answer the same logical operation with differently shaped
//! JSON. Each decoder here tries the known shapes in a fixed priority order
//! and reports [`ChatError::ShapeMismatch`] when none fit.

use serde_json::Value;

use crate::error::ChatError;
use crate::session::model::{id_text, SessionRecord};
use crate::session::{BackendKind, Session, SessionId};

/// Extract the new session id from a create-session response.
///
/// Shapes, in order: bare string, `{id}`, `{session: {id}}`,
/// `[{id}, ...]`. A shape whose id is empty or not a string/integer does
/// not match and the next one is tried. Integer ids are kept as their
/// decimal text.
pub fn session_id(value: &Value) -> Result<SessionId, ChatError> {
    let found = value
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| value.get("id").and_then(id_text))
        .or_else(|| {
            value
                .get("session")
                .and_then(|session| session.get("id"))
                .and_then(id_text)
        })
        .or_else(|| {
            value
                .as_array()
                .and_then(|items| items.first())
                .and_then(|first| first.get("id"))
                .and_then(id_text)
        });

    found.map(SessionId).ok_or_else(|| {
        ChatError::ShapeMismatch("session creation response did not contain an 'id' field".to_string())
    })
}

/// Result of decoding a session list: the sessions that could be read, and
/// how many entries had to be dropped.
#[derive(Debug, Default)]
pub struct SessionList {
    pub sessions: Vec<Session>,
    pub dropped: usize,
}

/// Decode a list-sessions response: `{sessions: [...]}` or `[...]`.
/// Any other shape is an empty list.
pub fn session_list(value: Value, backend: BackendKind, user_id: &str) -> SessionList {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("sessions") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut list = SessionList::default();
    for item in items {
        match serde_json::from_value::<SessionRecord>(item) {
            Ok(record) => list.sessions.push(record.into_session(backend, user_id)),
            Err(err) => {
                log::debug!("Dropping unreadable session entry: {}", err);
                list.dropped += 1;
            }
        }
    }
    list
}

/// Decode a get-session response. Anything but an object with an id is
/// absent.
pub fn session_object(value: Value, backend: BackendKind, user_id: &str) -> Option<Session> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value::<SessionRecord>(value)
        .ok()
        .map(|record| record.into_session(backend, user_id))
}

/// Unwrap the `{output: ...}` envelope used by the managed engine's
/// `:query` method. Values without the envelope pass through unchanged.
pub fn unwrap_output(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("output") => {
            map.remove("output").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod session_id {
        use super::*;

        #[test]
        fn bare_string() {
            assert_eq!(session_id(&json!("s0")).unwrap(), SessionId::from("s0"));
        }

        #[test]
        fn object_with_id() {
            assert_eq!(session_id(&json!({"id": "s1", "userId": "u"})).unwrap(), SessionId::from("s1"));
        }

        #[test]
        fn nested_session_object() {
            assert_eq!(session_id(&json!({"session": {"id": "s1"}})).unwrap(), SessionId::from("s1"));
        }

        #[test]
        fn first_list_element() {
            let value = json!([{"id": "s2"}, {"id": "s3"}]);
            assert_eq!(session_id(&value).unwrap(), SessionId::from("s2"));
        }

        #[test]
        fn top_level_id_wins_over_nested() {
            let value = json!({"id": "top", "session": {"id": "nested"}});
            assert_eq!(session_id(&value).unwrap(), SessionId::from("top"));
        }

        #[test]
        fn non_string_top_level_id_falls_through() {
            let value = json!({"id": null, "session": {"id": "nested"}});
            assert_eq!(session_id(&value).unwrap(), SessionId::from("nested"));
        }

        #[test]
        fn empty_top_level_id_falls_through() {
            let value = json!({"id": "", "session": {"id": "nested"}});
            assert_eq!(session_id(&value).unwrap(), SessionId::from("nested"));
        }

        #[test]
        fn integer_id_is_kept_as_text() {
            assert_eq!(session_id(&json!({"id": 42})).unwrap(), SessionId::from("42"));
            assert_eq!(session_id(&json!({"session": {"id": 7}})).unwrap(), SessionId::from("7"));
        }

        #[test]
        fn fractional_id_is_not_an_id() {
            assert!(matches!(session_id(&json!({"id": 4.2})), Err(ChatError::ShapeMismatch(_))));
        }

        #[test]
        fn missing_id_is_shape_mismatch() {
            for value in [json!({}), json!([]), json!([{"name": "x"}]), json!(null), json!(7), json!("")] {
                assert!(matches!(session_id(&value), Err(ChatError::ShapeMismatch(_))));
            }
        }
    }

    mod session_list {
        use super::*;

        #[test]
        fn wrapped_list() {
            let list = session_list(
                json!({"sessions": [{"id": "a"}, {"id": "b"}]}),
                BackendKind::LocalRest,
                "u",
            );
            let ids: Vec<_> = list.sessions.iter().map(|s| s.id.as_str()).collect();
            assert_eq!(ids, vec!["a", "b"]);
            assert_eq!(list.dropped, 0);
        }

        #[test]
        fn bare_list() {
            let list = session_list(json!([{"id": "a", "userId": "u2"}]), BackendKind::AgentEngine, "u");
            assert_eq!(list.sessions.len(), 1);
            assert_eq!(list.sessions[0].user_id, "u2");
            assert_eq!(list.sessions[0].backend, BackendKind::AgentEngine);
        }

        #[test]
        fn null_sessions_is_empty() {
            let list = session_list(json!({"sessions": null}), BackendKind::LocalRest, "u");
            assert!(list.sessions.is_empty());
        }

        #[test]
        fn other_shapes_are_empty() {
            for value in [json!({"items": []}), json!("x"), json!(null), json!(1)] {
                assert!(session_list(value, BackendKind::LocalRest, "u").sessions.is_empty());
            }
        }

        #[test]
        fn unreadable_entries_are_counted() {
            let list = session_list(
                json!([{"id": "a"}, "junk", {"name": "no id"}, {"id": ""}, {"id": 9}]),
                BackendKind::LocalRest,
                "u",
            );
            let ids: Vec<_> = list.sessions.iter().map(|s| s.id.as_str()).collect();
            assert_eq!(ids, vec!["a", "9"]);
            assert_eq!(list.dropped, 3);
        }
    }

    mod session_object {
        use super::*;

        #[test]
        fn object_becomes_session() {
            let session = session_object(
                json!({"id": "s1", "events": [{"author": "user", "content": {"parts": [{"text": "hi"}]}}]}),
                BackendKind::LocalRest,
                "u",
            )
            .unwrap();
            assert_eq!(session.events.len(), 1);
            assert_eq!(session.user_id, "u");
        }

        #[test]
        fn non_object_is_absent() {
            assert!(session_object(json!([]), BackendKind::LocalRest, "u").is_none());
            assert!(session_object(Value::Null, BackendKind::LocalRest, "u").is_none());
            assert!(session_object(json!("s1"), BackendKind::LocalRest, "u").is_none());
        }

        #[test]
        fn object_without_id_is_absent() {
            assert!(session_object(json!({"events": []}), BackendKind::LocalRest, "u").is_none());
        }
    }

    #[test]
    fn unwrap_output_envelope() {
        assert_eq!(unwrap_output(json!({"output": {"id": "s1"}})), json!({"id": "s1"}));
        assert_eq!(unwrap_output(json!({"id": "s1"})), json!({"id": "s1"}));
        assert_eq!(unwrap_output(json!([1])), json!([1]));
    }
}
