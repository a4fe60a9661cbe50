//! Upload session state machine for the extraction orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle states of one section's remote upload.
///
/// Transitions only move forward; `Active` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Pending,
    Uploading,
    Processing,
    Active,
    Failed,
}

impl SessionState {
    fn rank(self) -> u8 {
        match self {
            SessionState::Pending => 0,
            SessionState::Uploading => 1,
            SessionState::Processing => 2,
            SessionState::Active | SessionState::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Active | SessionState::Failed)
    }

    /// Forward-only: a state can advance to any strictly later state.
    ///
    /// Skipping `Processing` is legal: small uploads can come back from the
    /// API already active.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Pending => write!(f, "PENDING"),
            SessionState::Uploading => write!(f, "UPLOADING"),
            SessionState::Processing => write!(f, "PROCESSING"),
            SessionState::Active => write!(f, "ACTIVE"),
            SessionState::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid session transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// One section's upload lifecycle, owned by a single orchestrator task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub remote_file_id: Option<String>,
    pub state: SessionState,
    pub created_at: String,
    pub last_polled_at: Option<String>,
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            remote_file_id: None,
            state: SessionState::Pending,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_polled_at: None,
        }
    }

    /// Advance to `next`, rejecting regressions and moves out of a terminal
    /// state.
    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn mark_polled(&mut self) {
        self.last_polled_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut session = UploadSession::new();
        assert_eq!(session.state, SessionState::Pending);

        session.advance(SessionState::Uploading).unwrap();
        session.advance(SessionState::Processing).unwrap();
        session.advance(SessionState::Active).unwrap();
        assert!(session.state.is_terminal());
    }

    #[test]
    fn test_upload_can_skip_processing() {
        let mut session = UploadSession::new();
        session.advance(SessionState::Uploading).unwrap();
        // Small files can come back active without a processing phase
        session.advance(SessionState::Active).unwrap();
    }

    #[test]
    fn test_failure_from_any_live_state() {
        let mut session = UploadSession::new();
        session.advance(SessionState::Uploading).unwrap();
        session.advance(SessionState::Failed).unwrap();
        assert!(session.state.is_terminal());
    }

    #[test]
    fn test_no_regression() {
        let mut session = UploadSession::new();
        session.advance(SessionState::Processing).unwrap();
        let err = session.advance(SessionState::Uploading);
        assert!(err.is_err());
        assert_eq!(session.state, SessionState::Processing);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut session = UploadSession::new();
        session.advance(SessionState::Failed).unwrap();
        assert!(session.advance(SessionState::Active).is_err());

        let mut session = UploadSession::new();
        session.advance(SessionState::Active).unwrap();
        assert!(session.advance(SessionState::Failed).is_err());
    }

    #[test]
    fn test_self_transition_rejected() {
        let mut session = UploadSession::new();
        session.advance(SessionState::Processing).unwrap();
        assert!(session.advance(SessionState::Processing).is_err());
    }
}
