//! Sessions and the orchestrator that drives them.
//!
//! A session lives on the backend; this side only ever holds snapshots of
//! it. The [`SessionOrchestrator`] tracks which one the user is talking in
//! and keeps the displayed history in step with the backend's event log.

mod manager;
pub(crate) mod model;
mod state;

pub use manager::SessionOrchestrator;
pub use model::{BackendKind, Content, Event, Part, Session, SessionId};
pub use state::ActiveSession;
