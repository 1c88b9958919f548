//! Fan-out of job events to independently-paced observers.
//!
//! Every subscription owns a private cursor and a private drain task. The
//! log never pushes to observers; on each append the fan-out merely nudges
//! each drain task, which pulls its own backlog with
//! [`EventLog::since`]. This keeps a slow observer from stalling the worker
//! or any other observer, and makes the "subscriber joins during an append"
//! race a non-issue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot, Mutex, Notify};

use crate::event::{Event, EventLog};

/// Output channel of a subscription. Unbounded so the drain task (and,
/// transitively, the worker's `append`) never blocks on a slow consumer.
pub type EventSink = mpsc::UnboundedSender<Arc<Event>>;

/// Manages the subscriptions of one job.
///
/// Holds only weak handles to each subscription's wake-up [`Notify`]; a
/// drain task that exits (observer disconnected, or job done) is pruned on
/// the next notification sweep.
pub struct SubscriptionSet {
    log: Arc<EventLog>,
    subscribers: Mutex<Vec<Weak<Notify>>>,
    terminal: Arc<AtomicBool>,
}

impl SubscriptionSet {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            subscribers: Mutex::new(Vec::new()),
            terminal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a new observer and start its drain task.
    ///
    /// The task immediately replays every event with index greater than
    /// `cursor` (pass `-1` for the full backlog) into `sink`, then drains
    /// again on each notification. The returned receiver fires exactly once,
    /// after the job is terminal and the backlog has been fully delivered.
    /// Subscribing to an already-terminal job replays and fires immediately.
    pub async fn subscribe(&self, cursor: i64, sink: EventSink) -> oneshot::Receiver<()> {
        let notify = Arc::new(Notify::new());
        let (done_tx, done_rx) = oneshot::channel();

        self.subscribers.lock().await.push(Arc::downgrade(&notify));

        let log = Arc::clone(&self.log);
        let terminal = Arc::clone(&self.terminal);
        tokio::spawn(async move {
            if drain_until_done(&log, &terminal, &notify, cursor, &sink).await {
                let _ = done_tx.send(());
            }
        });

        done_rx
    }

    /// Nudge every live subscription to drain newly appended events.
    ///
    /// Fire-and-forget per subscriber; the actual delivery happens on each
    /// subscription's own task.
    pub async fn notify_all(&self) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|weak| match weak.upgrade() {
            Some(notify) => {
                notify.notify_one();
                true
            }
            None => false,
        });
    }

    /// Mark the job terminal and wake every subscription so it can finish
    /// draining and fire its done signal.
    ///
    /// Must be called after the final event has been appended. Idempotent.
    pub async fn finish(&self) {
        self.terminal.store(true, Ordering::Release);
        self.notify_all().await;
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    /// Number of live subscriptions (dead ones may linger until the next
    /// notification sweep).
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .await
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Drain loop body for one subscription.
///
/// Returns `true` if the done signal should fire (job terminal, backlog
/// delivered) and `false` if the observer went away first.
///
/// The terminal flag is read *before* each drain: the flag is only set
/// after the final append, so observing it guarantees the subsequent
/// `since` call sees the complete log.
async fn drain_until_done(
    log: &EventLog,
    terminal: &AtomicBool,
    notify: &Notify,
    mut cursor: i64,
    sink: &EventSink,
) -> bool {
    loop {
        // Arm the waiter before draining; a notification arriving mid-drain
        // is retained as a permit, so no append is ever missed.
        let notified = notify.notified();

        let is_terminal = terminal.load(Ordering::Acquire);

        for event in log.since(cursor).await {
            let index = event.index as i64;
            if sink.send(event).is_err() {
                // Observer disconnected; tear down this subscription only.
                return false;
            }
            cursor = index;
        }

        if is_terminal {
            return true;
        }

        notified.await;
    }
}
