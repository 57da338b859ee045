//! # Workflow Events
//!
//! Event types pushed to observers and the bus that fans them out.
//!
//! ## Delivery
//!
//! ```text
//! Sequencer ── publish ──▶ EventBus ──try_send──▶ subscriber queue (bounded) ──▶ observer
//!                             │        └────────▶ subscriber queue (bounded) ──▶ observer
//!                             └── recent window (replayed to late joiners)
//! ```
//!
//! Sequence numbers are assigned under the same lock that delivers, so every
//! subscriber sees events in publication order. A full queue drops the new
//! event for that subscriber only; publication never waits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;

use crate::error::RunFailure;
use crate::state::{Output, RunId, RunResult, RunSnapshot};
use crate::workflow::collaborators::FinalDocument;

/// Default per-subscriber queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default number of recent events replayed to a new subscriber
pub const DEFAULT_REPLAY_WINDOW: usize = 64;

/// An event in the workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Stage or progress changed
    StatusUpdate { run: RunSnapshot },
    /// A new output was appended to the run
    OutputAdded { output: Output },
    /// The run is parked on the approval gate
    ApprovalRequest { question: String, context: String },
    /// The run completed with a decision
    Completion {
        result: RunResult,
        final_document: FinalDocument,
    },
    /// The run failed or was cancelled
    Error { reason: String, failure: RunFailure },
}

impl WorkflowEvent {
    pub fn error(failure: RunFailure) -> Self {
        WorkflowEvent::Error {
            reason: failure.to_string(),
            failure,
        }
    }

    /// Wire name of the event, matching its serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::StatusUpdate { .. } => "status_update",
            WorkflowEvent::OutputAdded { .. } => "output_added",
            WorkflowEvent::ApprovalRequest { .. } => "approval_request",
            WorkflowEvent::Completion { .. } => "completion",
            WorkflowEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::Completion { .. } | WorkflowEvent::Error { .. }
        )
    }
}

/// A published event stamped with its global sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq: u64,
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: WorkflowEvent,
}

/// Identifier of a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(u64);

struct SubscriberSlot {
    tx: mpsc::Sender<EventEnvelope>,
    dropped: Arc<AtomicU64>,
}

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<SubscriberId, SubscriberSlot>,
    recent: VecDeque<EventEnvelope>,
}

/// Ordered, multi-subscriber event distribution
pub struct EventBus {
    inner: Mutex<BusInner>,
    next_seq: AtomicU64,
    next_subscriber: AtomicU64,
    queue_capacity: usize,
    replay_window: usize,
}

impl EventBus {
    /// Create a bus with the given per-subscriber capacity and replay window
    pub fn new(queue_capacity: usize, replay_window: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(BusInner::default()),
            next_seq: AtomicU64::new(1),
            next_subscriber: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
            replay_window,
        })
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        // A panic while holding the lock cannot leave the map half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver an event to every current subscriber; returns its sequence number
    pub fn publish(&self, run_id: RunId, event: WorkflowEvent) -> u64 {
        let mut inner = self.lock();
        let envelope = EventEnvelope {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            run_id,
            timestamp: Utc::now(),
            event,
        };

        let mut closed = Vec::new();
        for (id, slot) in inner.subscribers.iter() {
            match slot.tx.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    slot.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        subscriber = id.0,
                        seq = envelope.seq,
                        "Subscriber queue full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            inner.subscribers.remove(&id);
            tracing::debug!(subscriber = id.0, "Pruned closed subscriber");
        }

        if self.replay_window > 0 {
            if inner.recent.len() == self.replay_window {
                inner.recent.pop_front();
            }
            inner.recent.push_back(envelope.clone());
        }

        envelope.seq
    }

    /// Register a subscriber.
    ///
    /// The recent window is queued first, under the same lock as registration,
    /// so the subscriber sees one contiguous run of sequence numbers.
    pub fn subscribe(self: &Arc<Self>) -> EventSubscription {
        let mut inner = self.lock();
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::channel(self.queue_capacity + inner.recent.len());
        for envelope in inner.recent.iter() {
            // Capacity covers the replay, so this cannot fill up
            let _ = tx.try_send(envelope.clone());
        }
        let dropped = Arc::new(AtomicU64::new(0));
        inner.subscribers.insert(
            id,
            SubscriberSlot {
                tx,
                dropped: Arc::clone(&dropped),
            },
        );
        tracing::debug!(subscriber = id.0, "Subscriber registered");

        EventSubscription {
            id,
            rx,
            dropped,
            bus: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Sequence number the next published event will carry
    pub fn next_seq(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            inner: Mutex::new(BusInner::default()),
            next_seq: AtomicU64::new(1),
            next_subscriber: AtomicU64::new(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            replay_window: DEFAULT_REPLAY_WINDOW,
        }
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct EventSubscription {
    id: SubscriberId,
    rx: mpsc::Receiver<EventEnvelope>,
    dropped: Arc<AtomicU64>,
    bus: Weak<EventBus>,
}

impl EventSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event; `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.rx.try_recv().ok()
    }

    /// Events dropped for this subscriber because its queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop receiving new events. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Output;

    fn info(n: usize) -> WorkflowEvent {
        WorkflowEvent::OutputAdded {
            output: Output::info("system", format!("message {}", n)),
        }
    }

    fn drain(sub: &mut EventSubscription) -> Vec<u64> {
        let mut seqs = Vec::new();
        while let Some(envelope) = sub.try_recv() {
            seqs.push(envelope.seq);
        }
        seqs
    }

    #[tokio::test]
    async fn test_all_subscribers_see_publication_order() {
        let bus = EventBus::new(16, 0);
        let run_id = RunId::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        for n in 0..5 {
            bus.publish(run_id, info(n));
        }
        bus.publish(run_id, WorkflowEvent::error(RunFailure::Cancelled));

        let a_seqs = drain(&mut a);
        let b_seqs = drain(&mut b);
        assert_eq!(a_seqs, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(a_seqs, b_seqs);
    }

    #[tokio::test]
    async fn test_no_replay_when_window_disabled() {
        let bus = EventBus::new(16, 0);
        let run_id = RunId::new();
        bus.publish(run_id, info(0));

        let mut late = bus.subscribe();
        bus.publish(run_id, info(1));
        assert_eq!(drain(&mut late), vec![2]);
    }

    #[tokio::test]
    async fn test_late_joiner_gets_recent_window() {
        let bus = EventBus::new(16, 2);
        let run_id = RunId::new();
        for n in 0..4 {
            bus.publish(run_id, info(n));
        }

        let mut late = bus.subscribe();
        bus.publish(run_id, info(4));
        assert_eq!(drain(&mut late), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_full_queue_drops_tail_without_blocking() {
        let bus = EventBus::new(2, 0);
        let run_id = RunId::new();
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        for n in 0..3 {
            bus.publish(run_id, info(n));
            // fast keeps up, slow never reads
            assert!(fast.try_recv().is_some());
        }

        assert_eq!(slow.dropped(), 1);
        assert_eq!(fast.dropped(), 0);
        assert_eq!(drain(&mut slow), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new(4, 0);
        let mut sub = bus.subscribe();
        let id = sub.id();
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(RunId::new(), info(0));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_handle_is_pruned() {
        let bus = EventBus::new(4, 0);
        let sub = bus.subscribe();
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribers_see_contiguous_sequences() {
        let bus = EventBus::new(1024, 8);
        let run_id = RunId::new();

        let publisher = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                for n in 0..200 {
                    bus.publish(run_id, info(n));
                    if n % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let mut observers = Vec::new();
        for _ in 0..4 {
            let bus = Arc::clone(&bus);
            observers.push(tokio::spawn(async move {
                tokio::task::yield_now().await;
                let mut sub = bus.subscribe();
                let mut seqs = Vec::new();
                while let Some(envelope) = sub.recv().await {
                    seqs.push(envelope.seq);
                    if envelope.seq == 200 {
                        break;
                    }
                }
                seqs
            }));
        }

        publisher.await.unwrap();
        for observer in observers {
            let seqs = observer.await.unwrap();
            assert!(!seqs.is_empty());
            assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
            assert_eq!(*seqs.last().unwrap(), 200);
        }
    }

    #[test]
    fn test_envelope_serialization_is_flat() {
        let envelope = EventEnvelope {
            seq: 7,
            run_id: RunId::new(),
            timestamp: Utc::now(),
            event: WorkflowEvent::ApprovalRequest {
                question: "Approve?".into(),
                context: "summary".into(),
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], envelope.event.kind());
        assert_eq!(json["seq"], 7);
        assert_eq!(json["question"], "Approve?");
    }
}
