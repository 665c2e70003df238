//! Request bodies for the local agent server.
//!
//! # Endpoints
//!
//! ```text
//! GET    /list-apps
//! GET    /apps/{app}/users/{user}/sessions
//! POST   /apps/{app}/users/{user}/sessions          body: seed state or {}
//! GET    /apps/{app}/users/{user}/sessions/{id}
//! DELETE /apps/{app}/users/{user}/sessions/{id}
//! POST   /run_sse                                   body: RunRequest
//! ```
//!
//! `/run_sse` answers with a `data: `-framed stream of events:
//!
//! ```text
//! data: {"id":"e1","author":"greeting_agent","content":{"role":"model","parts":[{"text":"Hi"}]}}
//! ```

use serde::Serialize;

use crate::session::Part;

/// Body of `POST /run_sse`.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest<'a> {
    pub app_name: &'a str,
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub new_message: NewMessage,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

impl NewMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: "user",
            parts: vec![Part::text(text)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_request_wire_format() {
        let request = RunRequest {
            app_name: "greeting_agent",
            user_id: "test_user",
            session_id: "s1",
            new_message: NewMessage::user("hello"),
            stream: true,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "app_name": "greeting_agent",
                "user_id": "test_user",
                "session_id": "s1",
                "new_message": {"role": "user", "parts": [{"text": "hello"}]},
                "stream": true
            })
        );
    }
}
