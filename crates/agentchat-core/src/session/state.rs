//! The "active session" state machine.

use super::model::SessionId;

/// Which session, if any, the user is currently talking in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveSession {
    #[default]
    None,
    Active(SessionId),
}

impl ActiveSession {
    pub fn id(&self) -> Option<&SessionId> {
        match self {
            ActiveSession::Active(id) => Some(id),
            ActiveSession::None => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ActiveSession::Active(_))
    }

    /// `create` and `select` both land here.
    pub fn enter(&mut self, id: SessionId) {
        *self = ActiveSession::Active(id);
    }

    /// Apply a successful delete. Returns true if the active session was the
    /// one deleted (and the state dropped back to `None`).
    pub fn on_deleted(&mut self, deleted: &SessionId) -> bool {
        if self.id() == Some(deleted) {
            *self = ActiveSession::None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        *self = ActiveSession::None;
    }
}
