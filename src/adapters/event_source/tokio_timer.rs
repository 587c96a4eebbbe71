//! TokioRetryTimer - `RetryTimer` backed by a sleeping tokio task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ports::RetryTimer;

/// Elapsed notification for one `schedule()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryElapsed {
    pub generation: u64,
}

/// One-shot retry timer delivering into the owner's queue.
///
/// `cancel()` aborts the sleeping task. An elapsed event the task queued
/// just before the abort is recognised as stale through [`is_current`].
///
/// [`is_current`]: TokioRetryTimer::is_current
pub struct TokioRetryTimer<E> {
    events: mpsc::UnboundedSender<E>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl<E> TokioRetryTimer<E>
where
    E: From<RetryElapsed> + Send + 'static,
{
    pub fn new(events: mpsc::UnboundedSender<E>) -> Self {
        Self {
            events,
            generation: 0,
            pending: None,
        }
    }

    /// True if `generation` belongs to the schedule that is still armed.
    pub fn is_current(&self, generation: u64) -> bool {
        self.pending.is_some() && generation == self.generation
    }

    /// True while a schedule is armed and has not fired.
    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl<E> RetryTimer for TokioRetryTimer<E>
where
    E: From<RetryElapsed> + Send + 'static,
{
    fn schedule(&mut self, delay: Duration) {
        self.cancel();

        self.generation += 1;
        let elapsed = RetryElapsed {
            generation: self.generation,
        };
        let events = self.events.clone();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(E::from(elapsed));
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
            self.generation += 1;
        }
    }
}

impl<E> Drop for TokioRetryTimer<E> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}
