//! Non-fatal notices for the display collaborator.
//!
//! Decode failures, shape mismatches and skipped stream frames do not abort
//! the call that hit them. They are published here instead, and whatever
//! renders the conversation drains the bus and shows them to the user.
//!
//! # Example
//!
//! ```rust
//! use agentchat_core::diagnostics::{Diagnostics, Level};
//!
//! let diagnostics = Diagnostics::new();
//! let mut rx = diagnostics.subscribe();
//!
//! diagnostics.warn("Session creation returned no id");
//!
//! let notice = rx.try_recv().unwrap();
//! assert_eq!(notice.level, Level::Warning);
//! ```

use std::fmt;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::{ChatError, ErrorKind};

/// Receiving end of the diagnostics bus.
pub type Subscription = broadcast::Receiver<Diagnostic>;

/// Notices beyond this capacity make slow subscribers lag.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A single human-readable notice.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

/// Broadcast channel of [`Diagnostic`]s.
///
/// Publishing never blocks and never fails; with no subscribers the notice
/// is only logged.
pub struct Diagnostics {
    sender: broadcast::Sender<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notice. Returns the number of subscribers that got it.
    pub fn publish(&self, diagnostic: Diagnostic) -> usize {
        match diagnostic.level {
            Level::Info => log::info!("{}", diagnostic.message),
            Level::Warning => log::warn!("{}", diagnostic.message),
            Level::Error => log::error!("{}", diagnostic.message),
        }
        self.sender.send(diagnostic).unwrap_or(0)
    }

    pub fn info(&self, message: impl Into<String>) -> usize {
        self.publish(Diagnostic {
            level: Level::Info,
            kind: None,
            message: message.into(),
        })
    }

    pub fn warn(&self, message: impl Into<String>) -> usize {
        self.publish(Diagnostic {
            level: Level::Warning,
            kind: None,
            message: message.into(),
        })
    }

    /// Publish a failure at the given level, keeping its classification.
    pub fn report(&self, level: Level, error: &ChatError) -> usize {
        self.publish(Diagnostic {
            level,
            kind: Some(error.kind()),
            message: error.to_string(),
        })
    }

    pub fn subscribe(&self) -> Subscription {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently queued on a receiver, skipping over lag.
pub fn drain(rx: &mut Subscription) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(diagnostic) => out.push(diagnostic),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                log::warn!("Diagnostics subscriber lagged, {} notices dropped", missed);
            }
            Err(_) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_returns_zero() {
        let diagnostics = Diagnostics::new();
        assert_eq!(diagnostics.warn("nobody listening"), 0);
    }

    #[test]
    fn subscribers_receive_notices_in_order() {
        let diagnostics = Diagnostics::new();
        let mut rx = diagnostics.subscribe();

        diagnostics.info("first");
        diagnostics.warn("second");

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, "first");
        assert_eq!(notices[0].level, Level::Info);
        assert_eq!(notices[1].level, Level::Warning);
    }

    #[test]
    fn report_keeps_error_kind() {
        let diagnostics = Diagnostics::new();
        let mut rx = diagnostics.subscribe();

        let err = ChatError::ShapeMismatch("no id".to_string());
        diagnostics.report(Level::Warning, &err);

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.kind, Some(ErrorKind::ShapeMismatch));
        assert!(notice.message.contains("no id"));
    }

    #[test]
    fn multiple_subscribers_each_get_a_copy() {
        let diagnostics = Diagnostics::new();
        let mut rx1 = diagnostics.subscribe();
        let mut rx2 = diagnostics.subscribe();
        assert_eq!(diagnostics.subscriber_count(), 2);

        assert_eq!(diagnostics.warn("shared"), 2);
        assert_eq!(rx1.try_recv().unwrap().message, "shared");
        assert_eq!(rx2.try_recv().unwrap().message, "shared");
    }

    #[test]
    fn drain_survives_lag() {
        let diagnostics = Diagnostics::with_capacity(2);
        let mut rx = diagnostics.subscribe();
        for i in 0..5 {
            diagnostics.info(format!("n{}", i));
        }
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].message, "n4");
    }

    #[test]
    fn display_includes_level() {
        let notice = Diagnostic {
            level: Level::Error,
            kind: None,
            message: "boom".to_string(),
        };
        assert_eq!(notice.to_string(), "[error] boom");
    }
}
