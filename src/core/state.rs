//! Request State Machine
//!
//! - States are explicit and enumerable
//! - Transitions are driven by the pipeline, never inferred
//! - No state is re-entered
//! - `ShortCircuited`, `Completed` and `Failed` are terminal
//!
//! ```text
//! Received → PreFiltering → Rewriting → Executing → PostFiltering → Completed
//!                 └──────→ ShortCircuited
//! any non-terminal state → Failed
//! ```

use std::fmt;

use super::error::{CoreError, CoreResult};

/// Lifecycle state of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    Received,
    PreFiltering,
    /// A pre-filter supplied the result
    ShortCircuited,
    Rewriting,
    Executing,
    PostFiltering,
    Completed,
    Failed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "RECEIVED",
            RequestState::PreFiltering => "PRE_FILTERING",
            RequestState::ShortCircuited => "SHORT_CIRCUITED",
            RequestState::Rewriting => "REWRITING",
            RequestState::Executing => "EXECUTING",
            RequestState::PostFiltering => "POST_FILTERING",
            RequestState::Completed => "COMPLETED",
            RequestState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::ShortCircuited | RequestState::Completed | RequestState::Failed
        )
    }

    /// Whether `next` directly follows this state
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (Received, PreFiltering) => true,
            (PreFiltering, ShortCircuited) | (PreFiltering, Rewriting) => true,
            (Rewriting, Executing) => true,
            (Executing, PostFiltering) => true,
            (PostFiltering, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the state of one request and the path it took
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    state: RequestState,
    history: Vec<RequestState>,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            state: RequestState::Received,
            history: vec![RequestState::Received],
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// States visited so far, in order
    pub fn history(&self) -> &[RequestState] {
        &self.history
    }

    /// Move to `next`, rejecting transitions the machine does not allow
    pub fn transition(&mut self, next: RequestState) -> CoreResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` if still running
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = RequestState::Failed;
            self.history.push(RequestState::Failed);
        }
    }
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
