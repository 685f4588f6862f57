//! Debounce timer for cloud pushes
//!
//! There is a single deadline. Arming it again replaces the previous one, so
//! a burst of edits produces one push after the last edit. Failed pushes
//! re-arm with exponential backoff: `debounce * 2^failures`, capped.

use std::time::Duration;

use tokio::time::Instant;

/// Highest exponent applied to the debounce
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone)]
pub struct PushScheduler {
    debounce: Duration,
    max_backoff: Duration,
    deadline: Option<Instant>,
    failures: u32,
}

impl PushScheduler {
    pub fn new(debounce: Duration, max_backoff: Duration) -> Self {
        Self {
            debounce,
            max_backoff: max_backoff.max(debounce),
            deadline: None,
            failures: 0,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// (Re)start the debounce window after an edit
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.debounce);
    }

    /// Schedule a retry after a failed push; returns the delay used
    pub fn arm_after_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.backoff();
        self.deadline = Some(Instant::now() + delay);
        delay
    }

    pub fn on_success(&mut self) {
        self.failures = 0;
        self.deadline = None;
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Sleep until the deadline; returns at once when nothing is armed
    pub async fn wait(&self) {
        if let Some(deadline) = self.deadline {
            tokio::time::sleep_until(deadline).await;
        }
    }

    fn backoff(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures.min(MAX_BACKOFF_EXPONENT));
        self.debounce.saturating_mul(factor).min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> PushScheduler {
        PushScheduler::new(Duration::from_millis(2500), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let mut s = scheduler();
        assert!(!s.is_armed());

        s.arm();
        let first = s.deadline().unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        s.arm();
        let second = s.deadline().unwrap();

        assert_eq!(second - first, Duration::from_millis(1000));
        assert!(!s.is_due(Instant::now()));
        tokio::time::advance(Duration::from_millis(2500)).await;
        assert!(s.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_and_caps() {
        let mut s = scheduler();
        assert_eq!(s.arm_after_failure(), Duration::from_secs(5));
        assert_eq!(s.arm_after_failure(), Duration::from_secs(10));
        assert_eq!(s.arm_after_failure(), Duration::from_secs(20));
        assert_eq!(s.arm_after_failure(), Duration::from_secs(40));
        assert_eq!(s.arm_after_failure(), Duration::from_secs(60));
        for _ in 0..40 {
            s.arm_after_failure();
        }
        assert_eq!(s.arm_after_failure(), Duration::from_secs(60));

        s.on_success();
        assert_eq!(s.failures(), 0);
        assert!(!s.is_armed());
        assert_eq!(s.arm_after_failure(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_until_deadline() {
        let mut s = scheduler();
        let start = Instant::now();
        s.wait().await;
        assert_eq!(Instant::now(), start);

        s.arm();
        s.wait().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(2500));
    }
}
