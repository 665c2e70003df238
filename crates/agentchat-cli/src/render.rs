//! Plain-text rendering for the terminal.

use agentchat_core::response::ProbeReport;
use agentchat_core::timestamp::normalize_opt;
use agentchat_core::{ChatError, Diagnostic, Message, Session, SessionId, Speaker};

/// Characters of a session id shown in listings.
const SHORT_ID: usize = 8;

pub const HELP: &str = "\
Commands:
  /sessions          list sessions (cached until /refresh)
  /refresh           fetch the session list again
  /new [json]        create a session (optionally seeded) and switch to it
  /select <n|id>     switch to a session by list number or id
  /delete <n|id>     delete a session
  /history           show the active session's conversation
  /user <name>       switch user
  /apps              probe the server's app list (local backend only)
  /help              show this help
  /quit              exit
Anything else is sent to the agent.";

/// `* 1. 0123abcd… (05/03 14:07)`, starred when active.
pub fn session_line(index: usize, session: &Session, active: Option<&SessionId>) -> String {
    let marker = if active == Some(&session.id) { '*' } else { ' ' };
    format!(
        "{}{:>3}. {}… ({})",
        marker,
        index,
        session.id.short(SHORT_ID),
        normalize_opt(session.last_update_time.as_ref())
    )
}

pub fn session_list(sessions: &[Session], active: Option<&SessionId>) -> String {
    if sessions.is_empty() {
        return "No sessions found. Use /new to start one.".to_string();
    }
    sessions
        .iter()
        .enumerate()
        .map(|(i, session)| session_line(i + 1, session, active))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn message(message: &Message) -> String {
    match message.speaker() {
        Speaker::User => format!("you> {}", message.text),
        Speaker::Assistant => {
            let name = message.author.as_deref().unwrap_or(&message.role);
            format!("{}> {}", name, message.text)
        }
    }
}

pub fn history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "No conversation history yet. Start by sending a message!".to_string();
    }
    messages.iter().map(message).collect::<Vec<_>>().join("\n")
}

pub fn diagnostic(diagnostic: &Diagnostic) -> String {
    diagnostic.to_string()
}

pub fn error(err: &ChatError) -> String {
    format!("[error] {}", err)
}

pub fn probe(report: &ProbeReport) -> String {
    format!(
        "Status: {}\nContent-Type: {}\n{}",
        report.status,
        report.content_type.as_deref().unwrap_or("unknown"),
        report.body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentchat_core::timestamp::RawTimestamp;
    use agentchat_core::BackendKind;

    fn session(id: &str, ts: Option<RawTimestamp>) -> Session {
        Session {
            id: SessionId::from(id),
            user_id: "test_user".to_string(),
            last_update_time: ts,
            backend: BackendKind::LocalRest,
            events: Vec::new(),
        }
    }

    #[test]
    fn session_line_shortens_id_and_formats_time() {
        let s = session("0123456789abcdef", Some(RawTimestamp::Number(1709647620.0)));
        assert_eq!(session_line(1, &s, None), "   1. 01234567… (05/03 14:07)");
    }

    #[test]
    fn active_session_is_starred() {
        let s = session("abc", None);
        let line = session_line(2, &s, Some(&SessionId::from("abc")));
        assert_eq!(line, "*  2. abc… (Unknown)");
    }

    #[test]
    fn empty_session_list_hint() {
        assert!(session_list(&[], None).contains("/new"));
    }

    #[test]
    fn messages_are_labelled_by_speaker() {
        assert_eq!(message(&Message::user("hello")), "you> hello");

        let reply = Message {
            role: "model".to_string(),
            text: "hi".to_string(),
            author: Some("greeting_agent".to_string()),
        };
        assert_eq!(message(&reply), "greeting_agent> hi");
        assert_eq!(message(&Message::new("model", "x")), "model> x");
    }

    #[test]
    fn empty_history_hint() {
        assert!(history(&[]).starts_with("No conversation history"));
    }

    #[test]
    fn probe_shows_unknown_content_type() {
        let report = ProbeReport {
            status: 502,
            content_type: None,
            body: "<no body>".to_string(),
        };
        assert_eq!(probe(&report), "Status: 502\nContent-Type: unknown\n<no body>");
    }
}
