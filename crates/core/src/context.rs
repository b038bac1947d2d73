//! Host-supplied evaluation context.
//!
//! A [`Context`] carries the cancellation signal for one evaluation. The VM
//! polls it at backward jumps and call boundaries; native functions receive
//! it so blocking work can bail out early. Contexts are cheap to clone and
//! may be cancelled from any thread.

use crate::error::Error;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Cancellation context threaded through every evaluation and native call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Creates a context that is never cancelled unless the host asks.
    pub fn background() -> Self {
        Self::default()
    }

    /// Creates a context that cancels itself once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Creates a context that cancels itself at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    /// Cancels the context. All clones observe the cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once the context has been cancelled or its deadline passed.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.inner.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Returns `Err(runtime: interrupted)` once the context is cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::interrupted())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_never_cancelled() {
        let ctx = Context::background();
        assert!(!ctx.is_cancelled());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_cancel_observed_by_clones() {
        let ctx = Context::background();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(
            clone.check().unwrap_err().to_string(),
            "runtime: interrupted"
        );
    }

    #[test]
    fn test_deadline_in_past_cancels() {
        let ctx = Context::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_future_deadline_not_yet_cancelled() {
        let ctx = Context::with_timeout(Duration::from_secs(3600));
        assert!(!ctx.is_cancelled());
    }
}
