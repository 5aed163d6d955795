use gantry_core::{GantryError, GantryResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Finest granularity at which a stop-checked sleep polls the flag.
/// Bounds worst-case stop latency to one tick.
const STOP_POLL_TICK: Duration = Duration::from_millis(100);

/// Cooperative cancellation token shared between a supervisor and its task body.
///
/// Cancellation is best-effort: the token only records the request, and the
/// task body is responsible for checking it at bounded intervals during any
/// wait. A body that never reaches a check point keeps running until it does.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-stopped state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing flag so supervisor and token observe the same state.
    pub(crate) fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Requests cooperative cancellation.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `TaskCancelled` if a stop has been requested.
    pub fn check(&self) -> GantryResult<()> {
        if self.is_stopped() {
            Err(GantryError::TaskCancelled(
                "stop requested by operator".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration`, polling the stop flag at ≤100 ms ticks.
    ///
    /// Aborts with `TaskCancelled` the instant the flag is observed set,
    /// rather than sleeping the full duration uninterruptibly.
    pub async fn sleep_checked(&self, duration: Duration) -> GantryResult<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let tick = (deadline - now).min(STOP_POLL_TICK);
            tokio::time::sleep(tick).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_not_stopped() {
        let token = CancelToken::new();
        assert!(!token.is_stopped());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_request_stop_flips_flag() {
        let token = CancelToken::new();
        token.request_stop();
        assert!(token.is_stopped());
        assert!(matches!(
            token.check(),
            Err(GantryError::TaskCancelled(_))
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.request_stop();
        assert!(token.is_stopped());
    }

    #[tokio::test]
    async fn test_sleep_completes_when_not_stopped() {
        let token = CancelToken::new();
        token
            .sleep_checked(Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sleep_aborts_within_one_tick() {
        let token = CancelToken::new();
        let sleeper = token.clone();
        let handle = tokio::spawn(async move {
            sleeper.sleep_checked(Duration::from_secs(30)).await
        });

        // Give the sleep a moment to start, then request the stop.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let started = std::time::Instant::now();
        token.request_stop();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(GantryError::TaskCancelled(_))));
        // Stop latency is bounded by one poll tick plus scheduling slack.
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_sleep_with_flag_already_set_aborts_immediately() {
        let token = CancelToken::new();
        token.request_stop();
        let result = token.sleep_checked(Duration::from_secs(5)).await;
        assert!(result.is_err());
    }
}
