//! Context implementation for request-scoped cancellation and deadlines
//!
//! Every handler receives a [`Context`]. Long waits (polling a remote
//! operation, backing off between retries) must race against
//! [`Context::cancelled`] so the caller's deadline is honoured.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Context carries the deadline and cancellation signal of one operation
/// CRITICAL: Pass this as first parameter to ALL async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    cancel: Arc<watch::Sender<bool>>,
}

/// Why a context stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cancellation::Cancelled => write!(f, "context cancelled"),
            Cancellation::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl Context {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                cancel: Arc::new(cancel),
            }),
        }
    }

    /// Derive a context that expires after `timeout`. The derived context
    /// shares cancellation with its parent and never outlives the parent's
    /// deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                cancel: self.inner.cancel.clone(),
            }),
        }
    }

    /// Apply `timeout` only when the caller did not set a deadline
    pub fn with_default_timeout(&self, timeout: Duration) -> Self {
        if self.inner.deadline.is_some() {
            self.clone()
        } else {
            self.with_timeout(timeout)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Returns the reason this context stopped, if it has
    pub fn err(&self) -> Option<Cancellation> {
        if *self.inner.cancel.borrow() {
            return Some(Cancellation::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancellation::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when no deadline is set
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns a channel that flips to true when the context is cancelled
    /// explicitly. Deadlines are reported through [`Context::cancelled`].
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.cancel.subscribe()
    }

    pub fn cancel(&self) {
        self.inner.cancel.send_replace(true);
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) -> Cancellation {
        if let Some(reason) = self.err() {
            return reason;
        }

        let mut done = self.done();
        let deadline = self.inner.deadline;

        tokio::select! {
            _ = async {
                if done.wait_for(|cancelled| *cancelled).await.is_err() {
                    std::future::pending::<()>().await;
                }
            } => Cancellation::Cancelled,
            _ = async {
                match deadline {
                    Some(deadline) => {
                        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                    }
                    None => std::future::pending::<()>().await,
                }
            } => Cancellation::DeadlineExceeded,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(100));

        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(150)).await;

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.err(), Some(Cancellation::DeadlineExceeded));
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();

        assert!(!ctx.is_cancelled());

        ctx.cancel();

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.err(), Some(Cancellation::Cancelled));
    }

    #[tokio::test]
    async fn context_deadline() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());

        let ctx_with_timeout = ctx.with_timeout(Duration::from_secs(1));
        assert!(ctx_with_timeout.deadline().is_some());
        assert!(ctx_with_timeout.remaining().unwrap() <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn default_timeout_keeps_caller_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_secs(5));
        let derived = ctx.with_default_timeout(Duration::from_secs(1800));
        assert_eq!(ctx.deadline(), derived.deadline());

        let fresh = Context::new().with_default_timeout(Duration::from_secs(60));
        assert!(fresh.deadline().is_some());
    }

    #[tokio::test]
    async fn child_never_outlives_parent() {
        let parent = Context::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(parent.deadline(), child.deadline());
    }

    #[tokio::test]
    async fn cancelling_parent_cancels_child() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));

        let waiter = tokio::spawn({
            let child = child.clone();
            async move { child.cancelled().await }
        });

        parent.cancel();
        assert_eq!(waiter.await.unwrap(), Cancellation::Cancelled);
    }

    #[test]
    fn cancelled_stays_pending_until_cancel() {
        let ctx = Context::new();
        let mut waiter = tokio_test::task::spawn(ctx.cancelled());
        tokio_test::assert_pending!(waiter.poll());

        ctx.cancel();
        assert!(waiter.is_woken());
        tokio_test::assert_ready_eq!(waiter.poll(), Cancellation::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_resolves_on_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        assert_eq!(ctx.cancelled().await, Cancellation::DeadlineExceeded);
    }
}
