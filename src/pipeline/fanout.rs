// ABOUTME: Bounded concurrent execution of one unit of work per target.
// ABOUTME: A single target runs inline; otherwise at most `limit` run at once.

use crate::types::Concurrency;
use futures::StreamExt;
use std::future::Future;

/// Run `work` for every item and collect every result.
///
/// Results come back in input order. No result short-circuits the others.
pub async fn fan_out<T, F, Fut>(items: Vec<T>, limit: Concurrency, work: F) -> Vec<Fut::Output>
where
    F: Fn(T) -> Fut,
    Fut: Future,
{
    if items.len() <= 1 {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(work(item).await);
        }
        return results;
    }

    let mut indexed: Vec<(usize, Fut::Output)> = futures::stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let unit = work(item);
            async move { (index, unit.await) }
        })
        .buffer_unordered(limit.get())
        .collect()
        .await;

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_limit_and_keeps_order() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = fan_out((0..8).collect(), Concurrency::clamped(3), |i: u64| {
            let running = &running;
            let peak = &peak;
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 * (8 - i))).await;
                running.fetch_sub(1, Ordering::SeqCst);
                i * 2
            }
        })
        .await;

        assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14]);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn single_item_runs_inline() {
        let results = fan_out(vec!["only"], Concurrency::default(), |s| async move { s.len() }).await;
        assert_eq!(results, vec![4]);
    }
}
