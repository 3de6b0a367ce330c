//! Fixed-interval polling with a hard wall-clock timeout.
//!
//! Every wait-for-external-completion point in the pipeline (cross-region
//! replication, crawler runs, query execution) goes through
//! [`await_condition`]: probe, sleep a fixed interval, give up at the
//! deadline. No backoff, no cancellation beyond dropping the future.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;

/// Fixed poll interval and hard timeout for one wait point.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollWindow {
    /// Sleep between probes.
    pub interval: Duration,
    /// Wall-clock deadline for the whole wait.
    pub timeout: Duration,
}

/// Outcome of a poll that did not produce a value.
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The deadline passed without the condition becoming true.
    #[error("timed out after {timeout_secs}s waiting for {what}")]
    TimedOut {
        /// Condition being waited on.
        what: &'static str,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The probe itself failed; polling stops immediately.
    #[error("{0}")]
    Probe(E),
}

/// Polls `probe` every `interval` until it yields a value or `timeout`
/// elapses.
///
/// The probe returns `Ok(Some(value))` when the condition holds,
/// `Ok(None)` to keep waiting, or `Err` to abort. The probe always runs at
/// least once, and the deadline is checked before each sleep so a satisfied
/// condition is never discarded.
///
/// # Errors
///
/// Returns [`PollError::TimedOut`] when the deadline passes and
/// [`PollError::Probe`] when the probe fails.
pub async fn await_condition<T, E, F, Fut>(
    what: &'static str,
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await.map_err(PollError::Probe)? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(PollError::TimedOut {
                what,
                timeout_secs: timeout.as_secs(),
            });
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAST: Duration = Duration::from_millis(1);
    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn returns_value_on_first_probe() {
        let result: Result<u32, PollError<String>> =
            await_condition("ready", FAST, SHORT, || async { Ok(Some(7)) }).await;
        assert!(matches!(result, Ok(7)));
    }

    #[tokio::test]
    async fn keeps_polling_until_condition_holds() {
        let attempts = AtomicUsize::new(0);
        let result: Result<&str, PollError<String>> =
            await_condition("ready", FAST, SHORT, || {
                let attempts = &attempts;
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Ok(None)
                    } else {
                        Ok(Some("done"))
                    }
                }
            })
            .await;
        assert!(matches!(result, Ok("done")));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_when_condition_never_holds() {
        let result: Result<u32, PollError<String>> =
            await_condition("never", FAST, SHORT, || async { Ok(None) }).await;
        let Err(PollError::TimedOut { what, .. }) = result else {
            panic!("expected timeout, got {result:?}");
        };
        assert_eq!(what, "never");
    }

    #[tokio::test]
    async fn probe_errors_abort_polling() {
        let result: Result<u32, PollError<String>> =
            await_condition("ready", FAST, SHORT, || async {
                Err(String::from("boom"))
            })
            .await;
        let Err(PollError::Probe(message)) = result else {
            panic!("expected probe error, got {result:?}");
        };
        assert_eq!(message, "boom");
    }
}
