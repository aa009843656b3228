use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::propagation::TraceCarrier;

// ============================================================================
// Call Context
// ============================================================================
//
// Cancellation scope of one PlaceOrder call. Every suspension point in the
// pipeline races its work against `cancelled()`, so a cancelled or expired
// call never blocks past that moment. Outbound requests already on the wire
// may still complete on their own.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context canceled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
    trace: TraceCarrier,
}

/// Cancels the paired context. Dropping it without calling `cancel` leaves
/// the context alive until its deadline.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    /// Turns the handle into a guard that cancels when dropped
    pub fn drop_guard(self) -> CancelGuard {
        CancelGuard(self)
    }
}

/// Cancels its context on drop, however the owning scope ends
#[derive(Debug)]
pub struct CancelGuard(CancelHandle);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl CallContext {
    pub fn new(deadline: Option<Instant>, trace: TraceCarrier) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel: rx,
            deadline,
            trace,
        };
        (ctx, CancelHandle(tx))
    }

    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::new(None, TraceCarrier::new_root()).0
    }

    pub fn with_timeout(timeout: Duration, trace: TraceCarrier) -> (Self, CancelHandle) {
        Self::new(Some(Instant::now() + timeout), trace)
    }

    pub fn trace(&self) -> &TraceCarrier {
        &self.trace
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.cancel.clone();
        let signal = async move {
            // A dropped handle can never cancel; park instead of resolving
            let handle_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if handle_dropped {
                std::future::pending::<()>().await;
            }
            CancelReason::Cancelled
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                reason = signal => reason,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => signal.await,
        }
    }

    /// Runs `work` unless the context ends first
    pub async fn run<F, T>(&self, work: F) -> Result<T, CancelReason>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            out = work => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_when_not_cancelled() {
        let ctx = CallContext::background();
        let out = ctx.run(async { 42 }).await;
        assert_eq!(out, Ok(42));
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_work() {
        let (ctx, handle) = CallContext::new(None, TraceCarrier::new_root());

        let waiter = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.run(std::future::pending::<()>()).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        let out = waiter.await.unwrap();
        assert_eq!(out, Err(CancelReason::Cancelled));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let (ctx, _handle) = CallContext::with_timeout(Duration::from_millis(50), TraceCarrier::new_root());

        let out = ctx.run(tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(out, Err(CancelReason::DeadlineExceeded));
        assert_eq!(CancelReason::DeadlineExceeded.to_string(), "context deadline exceeded");
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (ctx, handle) = CallContext::new(None, TraceCarrier::new_root());
        drop(handle);

        let out = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(out.is_err());
    }

    #[tokio::test]
    async fn test_drop_guard_cancels_on_scope_exit() {
        let (ctx, handle) = CallContext::new(None, TraceCarrier::new_root());
        {
            let _guard = handle.drop_guard();
            assert!(!ctx.is_cancelled());
        }

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.cancelled().await, CancelReason::Cancelled);
    }
}
