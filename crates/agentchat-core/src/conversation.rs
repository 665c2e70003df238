//! Rebuilds displayable messages from a session's event log.

use serde::Serialize;

use crate::session::Event;

const UNKNOWN_ROLE: &str = "unknown";
const USER: &str = "user";

/// Who a message should be shown as coming from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One displayable message derived from one [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: String,
    pub text: String,
    /// Event author, kept so that a user event with a backend-specific
    /// content role still shows as the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Message {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
            author: None,
        }
    }

    /// A message typed by the user, shaped like the one the backend will
    /// later record for it.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: USER.to_string(),
            text: text.into(),
            author: Some(USER.to_string()),
        }
    }

    pub fn speaker(&self) -> Speaker {
        if self.role == USER || self.author.as_deref() == Some(USER) {
            Speaker::User
        } else {
            Speaker::Assistant
        }
    }
}

/// Fold events into messages, in order.
///
/// Pure: the same events always give the same messages, so this can be
/// re-run whenever the event log is refreshed.
pub fn reconstruct(events: &[Event]) -> Vec<Message> {
    events.iter().filter_map(message_from_event).collect()
}

/// The message for a single event, if it carries any text.
pub fn message_from_event(event: &Event) -> Option<Message> {
    let content = event.content.as_ref();

    let text: String = content
        .map(|c| c.parts.iter().filter_map(|part| part.text.as_deref()).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return None;
    }

    let role = content
        .and_then(|c| c.role.clone())
        .or_else(|| event.author.clone())
        .unwrap_or_else(|| UNKNOWN_ROLE.to_string());

    Some(Message {
        role,
        text,
        author: event.author.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn events(value: serde_json::Value) -> Vec<Event> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn drops_events_with_empty_text() {
        let log = events(json!([
            {"author": "user", "content": {"parts": [{"text": "hi"}]}},
            {"author": "agent", "content": {"parts": [{"text": ""}]}}
        ]));

        let messages = reconstruct(&log);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].text, "hi");
    }

    #[test]
    fn whitespace_only_text_is_dropped() {
        let log = events(json!([{"author": "agent", "content": {"parts": [{"text": "  \n"}]}}]));
        assert!(reconstruct(&log).is_empty());
    }

    #[test]
    fn concatenates_text_parts_and_skips_others() {
        let log = events(json!([{
            "author": "agent",
            "content": {"parts": [
                {"text": "Hello, "},
                {"functionCall": {"name": "f"}},
                {"text": null},
                {"text": "world"}
            ]}
        }]));

        let messages = reconstruct(&log);
        assert_eq!(messages[0].text, "Hello, world");
    }

    #[test]
    fn text_is_kept_untrimmed() {
        let log = events(json!([{"author": "agent", "content": {"parts": [{"text": " padded "}]}}]));
        assert_eq!(reconstruct(&log)[0].text, " padded ");
    }

    #[test]
    fn role_prefers_content_then_author_then_unknown() {
        let log = events(json!([
            {"author": "greeting_agent", "content": {"role": "model", "parts": [{"text": "a"}]}},
            {"author": "greeting_agent", "content": {"parts": [{"text": "b"}]}},
            {"content": {"parts": [{"text": "c"}]}}
        ]));

        let roles: Vec<_> = reconstruct(&log).into_iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["model", "greeting_agent", "unknown"]);
    }

    #[test]
    fn events_without_content_are_dropped() {
        let log = events(json!([{"author": "user"}, {"author": "agent", "content": null}]));
        assert!(reconstruct(&log).is_empty());
    }

    #[test]
    fn preserves_order() {
        let log = vec![
            Event::text("user", "one"),
            Event::text("agent", "two"),
            Event::text("user", "three"),
        ];
        let texts: Vec<_> = reconstruct(&log).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn is_idempotent() {
        let log = events(json!([
            {"author": "user", "content": {"role": "user", "parts": [{"text": "hi"}]}},
            {"author": "agent", "content": {"role": "model", "parts": [{"text": "hello"}]}},
            {"author": "agent", "content": {"parts": []}}
        ]));

        let first = reconstruct(&log);
        let second = reconstruct(&log);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    mod speaker {
        use super::*;

        #[test]
        fn user_role_or_author_is_user() {
            assert_eq!(Message::new("user", "x").speaker(), Speaker::User);

            let log = events(json!([{"author": "user", "content": {"role": "human", "parts": [{"text": "x"}]}}]));
            assert_eq!(reconstruct(&log)[0].speaker(), Speaker::User);
        }

        #[test]
        fn typed_message_matches_recorded_one() {
            let log = vec![Event::text("user", "hi")];
            assert_eq!(reconstruct(&log), vec![Message::user("hi")]);
        }

        #[test]
        fn everything_else_is_assistant() {
            assert_eq!(Message::new("model", "x").speaker(), Speaker::Assistant);
            assert_eq!(Message::new("unknown", "x").speaker(), Speaker::Assistant);
        }
    }
}
