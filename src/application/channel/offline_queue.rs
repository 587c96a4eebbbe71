//! OfflineQueue - FIFO buffer for work produced while the channel is down.
//!
//! Items are replayed in insertion order once the caller decides the channel
//! is usable again. Each item stays queued until its handler has run, so a
//! `size()` taken mid-drain still counts the item in flight.

use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessSummary {
    /// Items whose handler returned `Ok`.
    pub processed: usize,
    /// Items whose handler returned `Err`. They are not retried.
    pub failed: usize,
}

impl ProcessSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }
}

struct Pending<T> {
    items: VecDeque<T>,
    /// An item has been handed to a handler that has not returned yet.
    in_flight: bool,
}

/// Ordered, drain-once queue.
///
/// `add`, `clear` and `size` never wait. Concurrent `process` calls on one
/// queue are serialized; the second starts after the first returns and sees
/// only what is left.
pub struct OfflineQueue<T> {
    pending: Mutex<Pending<T>>,
    drain: tokio::sync::Mutex<()>,
}

impl<T> Default for OfflineQueue<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Pending {
                items: VecDeque::new(),
                in_flight: false,
            }),
            drain: tokio::sync::Mutex::new(()),
        }
    }
}

impl<T> OfflineQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail. Allowed while a drain is running.
    pub fn add(&self, item: T) {
        self.pending().items.push_back(item);
    }

    /// Discards every pending item.
    ///
    /// An item whose handler is running still completes, but is not counted
    /// again and nothing after it is handed out.
    pub fn clear(&self) {
        let mut pending = self.pending();
        pending.items.clear();
        pending.in_flight = false;
    }

    /// Number of pending items, including one being handled.
    pub fn size(&self) -> usize {
        let pending = self.pending();
        pending.items.len() + usize::from(pending.in_flight)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Drains the queue head to tail, awaiting each handler in turn.
    ///
    /// Items added during the drain are processed before this returns.
    /// A handler error is logged and counted; the item is still removed.
    ///
    /// The drain holds the queue for its whole run. A handler must not call
    /// `process` on the same queue: the inner call waits for the outer one,
    /// which waits for the handler, and neither returns.
    pub async fn process<F, Fut, E>(&self, mut handler: F) -> ProcessSummary
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let _drain = self.drain.lock().await;
        let mut summary = ProcessSummary::default();

        loop {
            let item = {
                let mut pending = self.pending();
                let Some(item) = pending.items.pop_front() else {
                    break;
                };
                pending.in_flight = true;
                item
            };

            match handler(item).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Offline queue handler failed, dropping item");
                    summary.failed += 1;
                }
            }

            self.pending().in_flight = false;
        }

        if summary.total() > 0 {
            tracing::debug!(
                processed = summary.processed,
                failed = summary.failed,
                "Offline queue drained"
            );
        }
        summary
    }

    fn pending(&self) -> MutexGuard<'_, Pending<T>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::time::Duration;

    async fn collect(queue: &OfflineQueue<u32>) -> (Vec<u32>, ProcessSummary) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let summary = queue
            .process(move |item| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(item);
                    Ok::<(), Infallible>(())
                }
            })
            .await;
        let seen = seen.lock().unwrap().clone();
        (seen, summary)
    }

    #[tokio::test]
    async fn processes_in_insertion_order() {
        let queue = OfflineQueue::new();
        for i in 0..5 {
            queue.add(i);
        }

        let (seen, summary) = collect(&queue).await;

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(summary.processed, 5);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn empty_queue_processes_nothing() {
        let queue = OfflineQueue::<u32>::new();
        let (seen, summary) = collect(&queue).await;

        assert!(seen.is_empty());
        assert_eq!(summary, ProcessSummary::default());
    }

    #[tokio::test]
    async fn item_stays_queued_until_handler_finishes() {
        let queue = Arc::new(OfflineQueue::new());
        queue.add("a");
        let observed = Arc::new(Mutex::new(Vec::new()));

        let q = Arc::clone(&queue);
        let obs = Arc::clone(&observed);
        queue
            .process(move |_| {
                let size = q.size();
                obs.lock().unwrap().push(size);
                async { Ok::<(), Infallible>(()) }
            })
            .await;

        assert_eq!(*observed.lock().unwrap(), vec![1]);
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn items_added_mid_drain_are_processed_in_same_call() {
        let queue = Arc::new(OfflineQueue::new());
        queue.add(1);
        queue.add(2);

        let q = Arc::clone(&queue);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        queue
            .process(move |item| {
                if item == 1 {
                    q.add(3);
                }
                sink.lock().unwrap().push(item);
                async { Ok::<(), Infallible>(()) }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_handler_is_counted_and_not_retried() {
        let queue = OfflineQueue::new();
        queue.add(1);
        queue.add(2);
        queue.add(3);

        let summary = queue
            .process(|item| async move {
                if item == 2 {
                    Err("boom")
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(summary, ProcessSummary { processed: 2, failed: 1 });
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn clear_discards_pending_items() {
        let queue = OfflineQueue::new();
        queue.add(1);
        queue.add(2);

        queue.clear();

        assert_eq!(queue.size(), 0);
        assert!(collect(&queue).await.0.is_empty());
    }

    #[tokio::test]
    async fn clear_during_drain_stops_after_current_item() {
        let queue = Arc::new(OfflineQueue::new());
        for i in 0..4 {
            queue.add(i);
        }

        let q = Arc::clone(&queue);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let summary = queue
            .process(move |item| {
                if item == 1 {
                    q.clear();
                }
                sink.lock().unwrap().push(item);
                async { Ok::<(), Infallible>(()) }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(summary.processed, 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn overlapping_process_calls_never_double_process() {
        let queue = Arc::new(OfflineQueue::new());
        for i in 0..20 {
            queue.add(i);
        }
        let seen = Arc::new(Mutex::new(Vec::new()));

        let run = |queue: Arc<OfflineQueue<u32>>, seen: Arc<Mutex<Vec<u32>>>| async move {
            queue
                .process(move |item| {
                    let seen = Arc::clone(&seen);
                    async move {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        seen.lock().unwrap().push(item);
                        Ok::<(), Infallible>(())
                    }
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(Arc::clone(&queue), Arc::clone(&seen)),
            run(Arc::clone(&queue), Arc::clone(&seen)),
        );

        assert_eq!(a.processed + b.processed, 20);
        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn items_need_not_be_clone() {
        struct Token(u32);

        let queue = OfflineQueue::new();
        queue.add(Token(7));
        queue.add(Token(8));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let summary = queue
            .process(move |Token(n)| {
                sink.lock().unwrap().push(n);
                async { Ok::<(), Infallible>(()) }
            })
            .await;

        assert_eq!(summary.processed, 2);
        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }

    #[tokio::test]
    async fn nested_process_from_a_handler_never_completes() {
        let queue = Arc::new(OfflineQueue::new());
        queue.add(1u32);
        let nested_finished = Arc::new(Mutex::new(None));

        let q = Arc::clone(&queue);
        let outcome = Arc::clone(&nested_finished);
        queue
            .process(move |_| {
                let q = Arc::clone(&q);
                let outcome = Arc::clone(&outcome);
                async move {
                    let inner = q.process(|_| async { Ok::<(), Infallible>(()) });
                    let finished = tokio::time::timeout(Duration::from_millis(50), inner)
                        .await
                        .is_ok();
                    *outcome.lock().unwrap() = Some(finished);
                    Ok::<(), Infallible>(())
                }
            })
            .await;

        assert_eq!(*nested_finished.lock().unwrap(), Some(false));
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn drain_preserves_order_for_any_input(items in proptest::collection::vec(any::<u32>(), 0..64)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let queue = OfflineQueue::new();
            for item in &items {
                queue.add(*item);
            }

            let (seen, summary) = runtime.block_on(collect(&queue));

            prop_assert_eq!(seen, items.clone());
            prop_assert_eq!(summary.processed, items.len());
            prop_assert_eq!(queue.size(), 0);
        }
    }
}
