//! Retrying link layer
//!
//! `RetryLink` wraps any `LedLink` and retries transient bus faults with a
//! fixed backoff. The controller shares its bus with other devices, so a
//! NAK or timeout on one write is common and usually clears on the next.
//!
//! ```text
//! [RegisterLink / MemoryLink]   ← raw writes
//!            |
//!       [RetryLink]             ← bounded retries, fixed backoff
//!            |
//!       [Controller]
//! ```

use std::time::Duration;

use tracing::debug;

use crate::error::LinkError;
use crate::types::{LedIndex, Rgb};
use crate::LedLink;

/// Retry budget for one link operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

/// A link wrapper that retries transient failures of the inner link.
pub struct RetryLink<L> {
    inner: L,
    policy: RetryPolicy,
}

impl<L: LedLink> RetryLink<L> {
    pub fn new(inner: L, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }

    pub fn into_inner(self) -> L {
        self.inner
    }

    fn with_retries<F>(&mut self, what: &str, mut op: F) -> Result<(), LinkError>
    where
        F: FnMut(&mut L) -> Result<(), LinkError>,
    {
        let attempts = self.policy.attempts.max(1);
        let mut last = None;

        for attempt in 0..attempts {
            match op(&mut self.inner) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => {
                    debug!("{} attempt {} failed: {}", what, attempt, e);
                    last = Some(e);
                    if attempt + 1 < attempts && !self.policy.backoff.is_zero() {
                        std::thread::sleep(self.policy.backoff);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(LinkError::RetriesExhausted {
            attempts,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

impl<L: LedLink> LedLink for RetryLink<L> {
    fn set_pixel(&mut self, index: LedIndex, color: Rgb) -> Result<(), LinkError> {
        self.with_retries("set_pixel", |link| link.set_pixel(index, color))
    }

    fn set_all(&mut self, color: Rgb) -> Result<(), LinkError> {
        self.with_retries("set_all", |link| link.set_all(color))
    }

    fn clear(&mut self) -> Result<(), LinkError> {
        self.with_retries("clear", |link| link.clear())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLink;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[test]
    fn test_recovers_after_transient_faults() {
        let mem = MemoryLink::new();
        mem.fail_next(2);
        let mut link = RetryLink::new(mem, fast(3));

        link.set_all(Rgb::GREEN).unwrap();
        assert_eq!(link.inner().pixels(), [Rgb::GREEN; crate::LED_COUNT]);
        assert_eq!(link.inner().failures_injected(), 2);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let mem = MemoryLink::new();
        mem.fail_next(5);
        let mut link = RetryLink::new(mem, fast(3));

        match link.clear() {
            Err(LinkError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        // Remaining injected faults are still pending
        assert!(link.clear().is_err());
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let mut mem = MemoryLink::new();
        mem.close().unwrap();
        let mut link = RetryLink::new(mem, fast(3));

        assert!(matches!(link.clear(), Err(LinkError::Closed)));
    }
}
