//! # agentchat-core
//!
//! Session and streaming layer for chatting with deployed conversational
//! agents.
//!
//! This crate is UI-agnostic and can be driven by:
//! - the `agentchat` terminal client
//! - any other front end that renders [`Message`]s and [`Diagnostic`]s
//!
//! ## Key Concepts
//!
//! - **Session**: A backend-tracked conversation with an ordered event log
//! - **Event**: One recorded or streamed turn fragment
//! - **Backend**: A local agent server or the managed cloud engine, both
//!   behind [`SessionTransport`]
//! - **Diagnostic**: A non-fatal notice published on the diagnostics bus

pub mod backends;
pub mod conversation;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod response;
pub mod session;
pub mod shapes;
pub mod sse;
pub mod timestamp;

// Re-export commonly used types
pub use backends::{connect, BackendConfig, EventStream, SessionTransport, TransportOptions};
pub use conversation::{reconstruct, Message, Speaker};
pub use diagnostics::{Diagnostic, Diagnostics, Level};
pub use error::{ChatError, ErrorKind, TransportKind};
pub use session::{ActiveSession, BackendKind, Event, Session, SessionId, SessionOrchestrator};
pub use timestamp::{normalize, DisplayTimestamp};
