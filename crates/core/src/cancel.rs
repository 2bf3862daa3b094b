use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A handle for cancelling a running loop.
///
/// Cancellation is cooperative: the loop observes the flag at step
/// boundaries only, never in the middle of a tool invocation, so a
/// cancelled run cannot leave partially applied tool effects behind.
/// A cancelled loop reports [`FailureReason::Cancelled`] together with
/// the trace collected so far.
///
/// [`FailureReason::Cancelled`]: crate::FailureReason::Cancelled
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a new, un-cancelled token.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        // Idempotent.
        token.cancel();
        assert!(token.is_cancelled());
    }
}
