/// Task state definitions for tracking crawl progress
///
/// Every task pulled from the frontier walks this machine to exactly one
/// terminal state.
use crate::WebdlError;
use std::fmt;

/// Represents the current state of a task in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task is waiting in the frontier
    Queued,

    /// Task passed the visited check and is being fetched
    Running,

    // ===== Terminal States =====
    /// URL was already visited, or the download was declined
    Skipped,

    /// Fetch and processing completed
    Succeeded,

    /// Fetch, parse or sink failed
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if `next` is a legal successor of this state
    ///
    /// `Queued` may go to `Skipped` or `Running`; `Running` may end in any
    /// terminal state. Terminal states have no successors.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Skipped | Self::Running),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(self, next: Self) -> Result<Self, WebdlError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(WebdlError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Short lowercase name, used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Skipped => "skipped",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
