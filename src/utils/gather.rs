//! Bounded-concurrency gathering of futures.

use futures_util::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;

/// Default number of tasks allowed to run at once.
pub const DEFAULT_GATHER_LIMIT: usize = 40;

/// Run `tasks` with at most `limit` in flight, returning every task's
/// result in input order. A failing task does not cancel its siblings.
pub async fn gather<I, F, T, E>(tasks: I, limit: usize) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;

    let guarded = tasks.into_iter().map(|task| async move {
        // The semaphore is never closed, so acquire only waits.
        let _permit = semaphore.acquire().await;
        task.await
    });

    join_all(guarded).await
}

/// Like [`gather`], but returns the first error in input order once the
/// whole batch has finished.
pub async fn try_gather<I, F, T, E>(tasks: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    gather(tasks, limit).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let tasks = (0..5u64).map(|i| async move {
            // Later tasks finish first
            tokio::time::sleep(Duration::from_millis(25 - i * 5)).await;
            Ok::<_, String>(i)
        });

        let results = try_gather(tasks, DEFAULT_GATHER_LIMIT).await;
        assert_eq!(results, Ok(vec![0, 1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..12).map(|_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        });

        let results = gather(tasks, 3).await;

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let completed = Arc::new(AtomicUsize::new(0));

        let tasks = (0..4).map(|i| {
            let completed = completed.clone();
            async move {
                if i == 1 {
                    return Err(format!("task {i} failed"));
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        });

        let results = gather(tasks, 2).await;

        assert_eq!(completed.load(Ordering::SeqCst), 3);
        assert_eq!(results[0], Ok(0));
        assert_eq!(results[1], Err("task 1 failed".to_string()));
        assert_eq!(results[3], Ok(3));
    }

    #[test]
    fn test_try_gather_returns_first_error() {
        let tasks = vec![
            futures_util::future::ready(Ok(1)),
            futures_util::future::ready(Err("second")),
            futures_util::future::ready(Err("third")),
        ];

        let result = tokio_test::block_on(try_gather(tasks, 1));
        assert_eq!(result, Err("second"));
    }

    #[test]
    fn test_zero_limit_still_makes_progress() {
        let tasks = vec![futures_util::future::ready(Ok::<_, ()>(7))];
        let result = tokio_test::block_on(try_gather(tasks, 0));
        assert_eq!(result, Ok(vec![7]));
    }
}
