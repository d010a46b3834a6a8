//! Bounded retry for idempotent reads.
//!
//! Writes never go through here: a write that failed with a storage error is
//! surfaced to the caller, who decides whether to resubmit.

use std::future::Future;
use std::time::Duration;

use domains::DomainResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub read_retries: u32,
    /// Delay before the first retry; grows linearly per attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            read_retries: 2,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            read_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Runs `op`, retrying only transient storage failures.
    pub async fn read<T, F, Fut>(&self, op_name: &'static str, mut op: F) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if err.is_transient() && attempt < self.read_retries => {
                    attempt += 1;
                    tracing::warn!(op = op_name, attempt, error = %err, "retrying read");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{DomainError, EntityKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            read_retries: 2,
            backoff: Duration::ZERO,
        };

        let value = policy
            .read("flaky", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DomainError::storage("connection reset"))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn business_errors_are_returned_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let id = Uuid::nil();
        let err = RetryPolicy::default()
            .read("missing", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(DomainError::not_found(EntityKind::Thread, id))
            })
            .await
            .unwrap_err();

        assert_eq!(err, DomainError::not_found(EntityKind::Thread, id));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = RetryPolicy::no_retries()
            .read("down", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(DomainError::storage("down"))
            })
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
