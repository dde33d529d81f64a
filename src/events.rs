//! Event plumbing between boards, the session and subscribers
//!
//! Boards push into an [`event_queue`]: parameter and status events travel over
//! a bounded channel where a full queue makes the sender wait, while meter
//! frames go into a single slot that the newest frame overwrites. The session
//! drains the queue and hands finished events to the [`EventDispatcher`].

use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{trace, warn};

use crate::types::{ConnectionStatus, MeterUpdate, ParameterChange};

/// Default capacity of the parameter/status queue
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

/// Events that must not be dropped
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedEvent {
    Parameter(ParameterChange),
    Status(ConnectionStatus),
}

/// Item handed out by [`EventReceiver::recv`]
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Queued(QueuedEvent),
    Meters(MeterUpdate),
}

#[derive(Default)]
struct MeterSlot {
    latest: Mutex<Option<MeterUpdate>>,
    notify: Notify,
}

/// Producer half, cloned into every board task
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<QueuedEvent>,
    meters: Arc<MeterSlot>,
}

/// Consumer half, owned by the session
pub struct EventReceiver {
    rx: mpsc::Receiver<QueuedEvent>,
    meters: Arc<MeterSlot>,
}

/// Create a queue holding at most `capacity` parameter/status events
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let meters = Arc::new(MeterSlot::default());
    (
        EventSender {
            tx,
            meters: meters.clone(),
        },
        EventReceiver { rx, meters },
    )
}

impl EventSender {
    /// Queue a parameter change, waiting while the queue is full
    ///
    /// Returns false once the receiving session is gone.
    pub async fn parameter(&self, change: ParameterChange) -> bool {
        self.tx.send(QueuedEvent::Parameter(change)).await.is_ok()
    }

    pub async fn status(&self, status: ConnectionStatus) -> bool {
        self.tx.send(QueuedEvent::Status(status)).await.is_ok()
    }

    /// Replace any meter frame not yet consumed
    pub fn meters(&self, update: MeterUpdate) {
        if self.meters.latest.lock().replace(update).is_some() {
            trace!("Meter frame superseded before delivery");
        }
        self.meters.notify.notify_one();
    }
}

impl EventReceiver {
    /// Next event; parameter and status events are preferred over meters
    ///
    /// Returns `None` when every sender has been dropped.
    pub async fn recv(&mut self) -> Option<Received> {
        loop {
            tokio::select! {
                biased;
                event = self.rx.recv() => return event.map(Received::Queued),
                _ = self.meters.notify.notified() => {
                    if let Some(update) = self.meters.latest.lock().take() {
                        return Some(Received::Meters(update));
                    }
                }
            }
        }
    }
}

/// Outbound event classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ParameterChanged,
    ConnectionStatusChanged,
    MeterUpdate,
}

/// Event delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum MixerEvent {
    ParameterChanged(ParameterChange),
    ConnectionStatusChanged(ConnectionStatus),
    MeterUpdate(MeterUpdate),
}

impl MixerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MixerEvent::ParameterChanged(_) => EventKind::ParameterChanged,
            MixerEvent::ConnectionStatusChanged(_) => EventKind::ConnectionStatusChanged,
            MixerEvent::MeterUpdate(_) => EventKind::MeterUpdate,
        }
    }
}

/// Subscriber callback; an `Err` is logged and counted, never propagated
pub type Subscriber = Arc<dyn Fn(&MixerEvent) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventDispatcher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    kind: EventKind,
    subscriber: Subscriber,
}

/// Synchronous fan-out of events to subscribers, in registration order
#[derive(Default)]
pub struct EventDispatcher {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    failures: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations.write().push(Registration { id, kind, subscriber });
        id
    }

    /// Returns false if the id was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut regs = self.registrations.write();
        let before = regs.len();
        regs.retain(|r| r.id != id);
        regs.len() != before
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registrations.read().iter().filter(|r| r.kind == kind).count()
    }

    /// Total subscriber failures (errors and panics) since creation
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver `event` to every subscriber of its kind
    ///
    /// Returns how many subscribers handled it successfully.
    pub fn dispatch(&self, event: &MixerEvent) -> usize {
        let kind = event.kind();
        // Snapshot so subscribers may (un)subscribe from inside a callback
        let targets: Vec<(SubscriptionId, Subscriber)> = self
            .registrations
            .read()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| (r.id, r.subscriber.clone()))
            .collect();

        let mut delivered = 0;
        for (id, subscriber) in targets {
            match catch_unwind(AssertUnwindSafe(|| subscriber(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!("Subscriber {:?} failed on {:?}: {:#}", id, kind, e);
                }
                Err(panic) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    warn!("Subscriber {:?} panicked on {:?}: {}", id, kind, msg);
                }
            }
        }
        delivered
    }
}
