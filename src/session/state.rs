use std::fmt;

use crate::foundation::error::{ReelError, ReelResult};

/// Lifecycle of a render session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Recording,
    Finalizing,
    Complete,
    Failed,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Aborted)
    }

    /// Whether `self -> next` is a legal edge.
    ///
    /// Every non-terminal state may fail or abort. Terminal states have no way out.
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Failed | Aborted) => true,
            (Idle, Loading)
            | (Loading, Ready)
            | (Ready, Recording)
            | (Recording, Finalizing)
            | (Finalizing, Complete) => true,
            _ => false,
        }
    }

    /// Validated transition.
    pub fn transition(self, next: SessionState) -> ReelResult<SessionState> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(ReelError::InvalidTransition(format!("{self} -> {next}")))
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}
