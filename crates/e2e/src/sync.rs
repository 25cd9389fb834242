//! Output synchronization: bounded presence poll followed by a settle phase
//!
//! The translator re-renders its output incrementally and never signals
//! completion. Reading as soon as *something* is present can observe a
//! partial render, so every read goes through two phases:
//!
//! 1. poll until an output element carries non-empty text (bounded),
//! 2. settle, either for a fixed quiescence interval or until consecutive
//!    reads agree.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::browser::{BrowserSession, ElementSnapshot};
use crate::error::{E2eError, E2eResult};

/// How to decide the output has stopped changing once it is present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Wait a fixed interval, then read once
    Fixed { delay_ms: u64 },

    /// Read every `interval_ms` until `consecutive` identical non-empty reads
    /// in a row, giving up on agreement after `max_wait_ms`
    Stable {
        consecutive: usize,
        interval_ms: u64,
        max_wait_ms: u64,
    },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Fixed { delay_ms: 3000 }
    }
}

/// Evaluate `probe` until it yields a value or `timeout` elapses.
///
/// The probe runs at least once and once more at the deadline. `Ok(None)`
/// means the deadline passed; probe errors are returned immediately.
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> E2eResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        if let Some(value) = probe().await? {
            debug!("Condition met after {} attempt(s)", attempts);
            return Ok(Some(value));
        }

        let now = Instant::now();
        if now >= deadline {
            debug!("Condition not met after {} attempt(s)", attempts);
            return Ok(None);
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// The element that counts as "the output": not an input, non-empty text
pub fn find_output(elements: &[ElementSnapshot]) -> Option<&ElementSnapshot> {
    elements
        .iter()
        .find(|el| !el.is_input_role() && !el.trimmed_text().is_empty())
}

/// Current output text, trimmed. Empty when nothing is rendered.
pub async fn read_output<S>(session: &S, selector: &str) -> E2eResult<String>
where
    S: BrowserSession + ?Sized,
{
    let elements = session.query(selector).await?;
    let text = find_output(&elements)
        .map(|el| el.trimmed_text().to_string())
        .unwrap_or_default();
    Ok(text)
}

/// Presence phase: wait until some output element has non-empty text
pub async fn wait_for_presence<S>(
    session: &S,
    selector: &str,
    timeout: Duration,
    interval: Duration,
) -> E2eResult<String>
where
    S: BrowserSession + ?Sized,
{
    let found = poll_until(timeout, interval, || async {
        let elements = session.query(selector).await?;
        Ok::<_, E2eError>(find_output(&elements).map(|el| el.trimmed_text().to_string()))
    })
    .await?;

    found.ok_or_else(|| E2eError::OutputTimeout {
        selector: selector.to_string(),
        waited: timeout,
    })
}

/// Wait until no output element carries text
pub async fn wait_for_empty<S>(
    session: &S,
    selector: &str,
    timeout: Duration,
    interval: Duration,
) -> E2eResult<()>
where
    S: BrowserSession + ?Sized,
{
    let cleared = poll_until(timeout, interval, || async {
        let text = read_output(session, selector).await?;
        Ok::<_, E2eError>(text.is_empty().then_some(()))
    })
    .await?;

    cleared.ok_or_else(|| {
        E2eError::Timeout(format!("output under '{}' to clear", selector))
    })
}

/// Settle phase: returns the text to assert on
pub async fn settle<S>(session: &S, selector: &str, strategy: &SettleStrategy) -> E2eResult<String>
where
    S: BrowserSession + ?Sized,
{
    match *strategy {
        SettleStrategy::Fixed { delay_ms } => {
            sleep(Duration::from_millis(delay_ms)).await;
            read_output(session, selector).await
        }
        SettleStrategy::Stable {
            consecutive,
            interval_ms,
            max_wait_ms,
        } => {
            let interval = Duration::from_millis(interval_ms);
            let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
            let mut last = read_output(session, selector).await?;
            let mut streak = usize::from(!last.is_empty());

            while streak < consecutive {
                if Instant::now() >= deadline {
                    warn!(
                        "Output under '{}' still changing after {}ms; using last read",
                        selector, max_wait_ms
                    );
                    break;
                }
                sleep(interval).await;

                let current = read_output(session, selector).await?;
                if !current.is_empty() && current == last {
                    streak += 1;
                } else {
                    streak = usize::from(!current.is_empty());
                    last = current;
                }
            }
            Ok(last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn find_output_skips_inputs_and_blank_elements() {
        let elements = vec![
            ElementSnapshot::new("TEXTAREA", None, "mama"),
            ElementSnapshot::new("DIV", None, "   \n"),
            ElementSnapshot::new("DIV", Some("textbox"), "typed"),
            ElementSnapshot::new("DIV", None, "  මම \n"),
        ];
        let found = find_output(&elements).unwrap();
        assert_eq!(found.trimmed_text(), "මම");
    }

    #[test]
    fn find_output_none_when_all_blank() {
        let elements = vec![
            ElementSnapshot::new("TEXTAREA", None, "mama"),
            ElementSnapshot::new("DIV", None, ""),
        ];
        assert!(find_output(&elements).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_returns_first_hit() {
        let calls = AtomicUsize::new(0);
        let got = poll_until(Duration::from_secs(10), Duration::from_millis(100), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, E2eError>((n == 4).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(got, Some(4));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_checks_again_at_deadline() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();
        let got: Option<()> = poll_until(Duration::from_millis(250), Duration::from_millis(100), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, E2eError>(None)
        })
        .await
        .unwrap();

        assert!(got.is_none());
        // t = 0, 100, 200, 250
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(250) && waited < Duration::from_millis(260));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_propagates_probe_errors() {
        let result: E2eResult<Option<()>> =
            poll_until(Duration::from_secs(1), Duration::from_millis(10), || async {
                Err(E2eError::Playwright("page crashed".into()))
            })
            .await;
        assert!(matches!(result, Err(E2eError::Playwright(_))));
    }

    #[test]
    fn settle_strategy_yaml_forms() {
        let fixed: SettleStrategy = serde_yaml::from_str("mode: fixed\ndelay_ms: 500").unwrap();
        assert_eq!(fixed, SettleStrategy::Fixed { delay_ms: 500 });

        let stable: SettleStrategy = serde_yaml::from_str(
            "mode: stable\nconsecutive: 3\ninterval_ms: 200\nmax_wait_ms: 4000",
        )
        .unwrap();
        assert_eq!(
            stable,
            SettleStrategy::Stable {
                consecutive: 3,
                interval_ms: 200,
                max_wait_ms: 4000
            }
        );
    }
}
