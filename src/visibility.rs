// Copyright 2026 Meterport Contributors
// SPDX-License-Identifier: Apache-2.0

//! First-visible-of-N race.
//!
//! The portal lands either on the dashboard (a previous session is still
//! valid) or on the login form. Rather than guessing, every candidate
//! locator is watched concurrently and whichever becomes visible first
//! decides the branch.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Anything that can be asked to become visible within a deadline.
///
/// Implemented by page locators; test code substitutes scripted targets.
#[async_trait]
pub trait VisibleTarget: Sync {
    async fn wait_until_visible(&self, timeout: Duration) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error("none of the {targets} watched targets became visible within {waited_ms}ms")]
    NoTargetVisible { waited_ms: u64, targets: usize },
}

/// Race all `targets` and return the index of the first one to become
/// visible.
///
/// Every target is watched concurrently; input order carries no priority
/// and ties are broken by completion time. A target that errors out below
/// the shared deadline (its own wait timing out included) is dropped from
/// the race without ending it — only a winner or expiry of the shared
/// deadline ends the race. The deadline timer is armed with whatever budget
/// remains after the watches are set up, clamped to zero, so setup overruns
/// fail immediately rather than extending the wait.
pub async fn wait_for_any_visible<T: VisibleTarget>(
    targets: &[T],
    timeout: Duration,
) -> Result<usize, VisibilityError> {
    let start = Instant::now();

    let mut waits: FuturesUnordered<_> = targets
        .iter()
        .enumerate()
        .map(|(index, target)| async move {
            target.wait_until_visible(timeout).await.map(|()| index)
        })
        .collect();

    let remaining = timeout.saturating_sub(start.elapsed());
    let deadline = tokio::time::sleep(remaining);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(finished) = waits.next() => {
                match finished {
                    Ok(index) => return Ok(index),
                    // Individual failures are absorbed; the shared
                    // deadline below is the only timeout that counts.
                    Err(_) => continue,
                }
            }
            () = &mut deadline => {
                return Err(VisibilityError::NoTargetVisible {
                    waited_ms: timeout.as_millis() as u64,
                    targets: targets.len(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    /// A target that becomes visible (or fails) after a fixed delay.
    struct Scripted {
        delay: Duration,
        fails: bool,
    }

    impl Scripted {
        fn visible_after(ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(ms),
                fails: false,
            }
        }

        fn fails_after(ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(ms),
                fails: true,
            }
        }
    }

    #[async_trait]
    impl VisibleTarget for Scripted {
        async fn wait_until_visible(&self, _timeout: Duration) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            if self.fails {
                bail!("target never became visible");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_first_visible_wins() {
        let targets = [Scripted::visible_after(300), Scripted::visible_after(10)];
        let start = Instant::now();
        let winner = wait_for_any_visible(&targets, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(winner, 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_input_order_carries_no_priority() {
        let targets = [Scripted::visible_after(10), Scripted::visible_after(300)];
        let winner = wait_for_any_visible(&targets, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(winner, 0);
    }

    #[tokio::test]
    async fn test_none_visible_times_out() {
        let targets = [
            Scripted::visible_after(10_000),
            Scripted::visible_after(10_000),
        ];
        let start = Instant::now();
        let err = wait_for_any_visible(&targets, Duration::from_millis(100))
            .await
            .unwrap_err();
        let VisibilityError::NoTargetVisible { waited_ms, targets } = err;
        assert_eq!(waited_ms, 100);
        assert_eq!(targets, 2);
        // Fails at approximately the shared deadline, within jitter.
        assert!(start.elapsed() >= Duration::from_millis(90));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_individual_failure_does_not_end_race() {
        let targets = [Scripted::fails_after(10), Scripted::visible_after(50)];
        let winner = wait_for_any_visible(&targets, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(winner, 1);
    }

    #[tokio::test]
    async fn test_all_failures_still_wait_for_shared_deadline() {
        let targets = [Scripted::fails_after(10), Scripted::fails_after(20)];
        let start = Instant::now();
        let err = wait_for_any_visible(&targets, Duration::from_millis(200)).await;
        assert!(err.is_err());
        // Per-target failures are swallowed; the race ends at the shared
        // deadline, not when the last target gives up.
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_simultaneous_targets_yield_exactly_one_winner() {
        let targets = [Scripted::visible_after(0), Scripted::visible_after(0)];
        let winner = wait_for_any_visible(&targets, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(winner < 2);
    }
}
