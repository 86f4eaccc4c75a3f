//! Single-flight cell: collapse concurrent calls into one shared operation.
//!
//! The cell holds at most one pending operation handle. Callers that arrive
//! while an operation is running attach to it and observe the same result;
//! the slot is emptied by the operation itself once its result (and any side
//! effects) are in place, so the next caller after completion starts a new
//! operation.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

type FlightHandle<T> = Shared<BoxFuture<'static, T>>;

pub struct SingleFlight<T> {
    slot: Arc<Mutex<Option<FlightHandle<T>>>>,
}

impl<T> Clone for SingleFlight<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Join the in-flight operation, or start `op` if none is running.
    ///
    /// The check for an existing flight and the installation of a new one
    /// happen under a single lock acquisition, so two concurrent callers can
    /// never both start an operation. The slot is cleared after `op`
    /// completes and before its result is handed to the waiters.
    pub async fn run<F, Fut>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(inflight) => inflight.clone(),
                None => {
                    let slot_handle = Arc::clone(&self.slot);
                    let fut = op();
                    let flight = async move {
                        let result = fut.await;
                        slot_handle.lock().await.take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let flight = SingleFlight::new();
        let executions = Arc::new(AtomicUsize::new(0));

        let calls: Vec<_> = (0..8)
            .map(|_| {
                let flight = flight.clone();
                let executions = Arc::clone(&executions);
                async move {
                    flight
                        .run(move || async move {
                            executions.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            42u32
                        })
                        .await
                }
            })
            .collect();

        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|&value| value == 42));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sequential_calls_execute_again() {
        let flight = SingleFlight::new();
        let executions = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let executions = Arc::clone(&executions);
            flight
                .run(move || async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_clears_the_slot() {
        let flight: SingleFlight<Result<u32, String>> = SingleFlight::new();

        let failed = flight
            .run(|| async { Err::<u32, String>("boom".to_string()) })
            .await;
        assert_eq!(failed, Err("boom".to_string()));

        // A later call starts a fresh operation instead of replaying the error.
        let ok = flight.run(|| async { Ok::<u32, String>(7) }).await;
        assert_eq!(ok, Ok(7));
    }
}
