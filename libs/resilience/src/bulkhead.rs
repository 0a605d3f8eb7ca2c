//! Named bounded-concurrency pool. Saturation fails fast rather than
//! queueing, per the "async pool < primary-store pool < request threads"
//! sizing rule: a caller that queues here is still queueing work the
//! primary store could never have absorbed anyway.

use crate::error::ResilienceError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct Bulkhead {
    name: String,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let available = self.semaphore.available_permits();
        let in_flight = self.max_concurrent.saturating_sub(available);

        let permit = self.semaphore.try_acquire().map_err(|_| ResilienceError::BulkheadFull {
            name: self.name.clone(),
            in_flight,
            max: self.max_concurrent,
        })?;

        let result = operation().await;
        drop(permit);
        result.map_err(ResilienceError::Inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn allows_calls_within_the_limit() {
        let bulkhead = Bulkhead::new("test", 3);
        for _ in 0..3 {
            let result = bulkhead.execute(|| async { Ok::<_, String>(()) }).await;
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn n_plus_one_concurrent_calls_to_a_pool_of_size_n_rejects_exactly_one() {
        let bulkhead = Bulkhead::new("test", 2);
        let barrier = Arc::new(tokio::sync::Barrier::new(3));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let bulkhead = bulkhead.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                bulkhead
                    .execute(|| {
                        let barrier = barrier.clone();
                        async move {
                            barrier.wait().await;
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, String>(())
                        }
                    })
                    .await
            }));
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        let third = bulkhead.execute(|| async { Ok::<_, String>(()) }).await;
        assert!(third.unwrap_err().is_bulkhead_full());

        barrier.wait().await;
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn releases_permit_after_completion() {
        let bulkhead = Bulkhead::new("test", 1);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            let result = bulkhead
                .execute(|| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                })
                .await;
            assert!(result.is_ok());
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn releases_permit_even_when_operation_errors() {
        let bulkhead = Bulkhead::new("test", 1);
        let first = bulkhead.execute(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(first, Err(ResilienceError::Inner(_))));

        let second = bulkhead.execute(|| async { Ok::<_, &str>(()) }).await;
        assert!(second.is_ok());
    }
}
