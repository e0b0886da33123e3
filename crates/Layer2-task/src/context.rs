//! Execution context - cancellation and deadlines
//!
//! The context is the only cancellation mechanism in the engine. Children
//! derived with [`ExecutionContext::child`] are cancelled together with
//! their parent and never outlive its deadline.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context is done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// Explicitly cancelled
    Cancelled,
    /// Deadline passed
    DeadlineExceeded,
}

impl ContextError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ContextError::DeadlineExceeded)
    }

    /// Short human-readable outcome, used as a failure message
    pub fn describe(&self) -> &'static str {
        match self {
            ContextError::Cancelled => "task cancelled",
            ContextError::DeadlineExceeded => "task timed out",
        }
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Cancelled => f.write_str("context canceled"),
            ContextError::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for ContextError {}

/// Cancellation token plus optional deadline governing one execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    /// A root context with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one cancelled by a signal handler
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child context ending at `now + timeout` (or earlier, if the parent does)
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context ending at `deadline` (or earlier, if the parent does)
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Child context cancelled with this one, sharing its deadline
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and all contexts derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Why the context is done, or `None` while it is live
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Waits for [`done`](Self::done) and reports why
    pub async fn wait_err(&self) -> ContextError {
        self.done().await;
        self.err().unwrap_or(ContextError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_propagates_to_children() {
        let parent = ExecutionContext::new();
        let child = parent.child();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        assert!(grandchild.err().is_none());
        parent.cancel();

        assert_eq!(child.err(), Some(ContextError::Cancelled));
        assert_eq!(grandchild.wait_err().await, ContextError::Cancelled);
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_reach_parent() {
        let parent = ExecutionContext::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let ctx = ExecutionContext::new().with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());

        let err = ctx.wait_err().await;
        assert_eq!(err, ContextError::DeadlineExceeded);
        assert_eq!(err.to_string(), "context deadline exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_never_extends_parent_deadline() {
        let parent = ExecutionContext::new().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn test_error_text() {
        assert_eq!(ContextError::Cancelled.to_string(), "context canceled");
        assert!(ContextError::DeadlineExceeded.is_timeout());
        assert_eq!(ContextError::Cancelled.describe(), "task cancelled");
    }
}
