//! The in-process event bus.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use k6s_core::{AuditEvent, EventType};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::warn;

/// Default bound on the pending-dispatch queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// A subscriber callback. Receives the event and returns an error
/// string on failure; errors are logged and otherwise ignored.
pub trait EventHandler: Send + Sync {
    /// Handle one event.
    fn handle(&self, event: Arc<AuditEvent>) -> HandlerFuture;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(Arc<AuditEvent>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    fn handle(&self, event: Arc<AuditEvent>) -> HandlerFuture {
        Box::pin(self(event))
    }
}

type Subscription = (Option<EventType>, Arc<dyn EventHandler>);

enum Msg {
    Event(Arc<AuditEvent>),
    Shutdown,
}

/// In-process publish/subscribe fabric for audit events.
///
/// Subscriptions are per-`EventType` or wildcard (`None` matches
/// everything). `publish` enqueues for asynchronous background
/// dispatch; `publish_sync` dispatches immediately and waits for every
/// matching handler.
pub struct EventBus {
    subs: std::sync::Mutex<Vec<Subscription>>,
    tx: mpsc::Sender<Msg>,
    rx_slot: AsyncMutex<Option<mpsc::Receiver<Msg>>>,
    worker: AsyncMutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl EventBus {
    /// Create a bus with the default queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a bus with an explicit bounded-queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            subs: std::sync::Mutex::new(Vec::new()),
            tx,
            rx_slot: AsyncMutex::new(Some(rx)),
            worker: AsyncMutex::new(None),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribe to a specific event type, or `None` for every event.
    pub fn subscribe(&self, event_type: Option<EventType>, handler: Arc<dyn EventHandler>) {
        self.subs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((event_type, handler));
    }

    /// Start the background dispatch consumer. Idempotent: a second
    /// call while already running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let Some(mut rx) = self.rx_slot.lock().await.take() else {
            return;
        };
        let bus = Arc::clone(self);
        *worker = Some(tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    Msg::Event(event) => {
                        bus.dispatch(&event).await;
                        bus.pending.fetch_sub(1, Ordering::SeqCst);
                    }
                    Msg::Shutdown => break,
                }
            }
        }));
    }

    /// Stop the consumer, draining whatever is already queued first.
    /// Idempotent: a second call after the consumer has stopped is a
    /// no-op.
    pub async fn stop(&self) {
        let handle = self.worker.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        // Best-effort: if the queue is full this waits for room, which
        // is bounded by the consumer itself draining concurrently.
        let _ = self.tx.send(Msg::Shutdown).await;
        let _ = handle.await;
    }

    /// Enqueue `event` for asynchronous dispatch. Non-blocking: if the
    /// queue is full, the event is dropped and a warning is logged.
    pub fn publish(&self, event: AuditEvent) {
        let event = Arc::new(event);
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.tx.try_send(Msg::Event(Arc::clone(&event))) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(event_type = %event.event_type, error = %err, "event bus queue full or closed, dropping event");
        }
    }

    /// Dispatch `event` to every matching handler directly, returning
    /// once all have completed. Handler errors are logged and
    /// swallowed, never propagated.
    pub async fn publish_sync(&self, event: AuditEvent) {
        let event = Arc::new(event);
        self.dispatch(&event).await;
    }

    async fn dispatch(&self, event: &Arc<AuditEvent>) {
        let matching: Vec<Arc<dyn EventHandler>> = {
            let subs = self
                .subs
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            subs.iter()
                .filter(|(kind, _)| kind.is_none_or(|k| k == event.event_type))
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in matching {
            if let Err(err) = handler.handle(Arc::clone(event)).await {
                warn!(event_type = %event.event_type, error = %err, "event handler failed");
            }
        }
    }

    /// Current depth of the asynchronous dispatch queue.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn sample_event(event_type: EventType) -> AuditEvent {
        AuditEvent {
            id: k6s_core::AuditEventId::new(),
            session_id: k6s_core::SessionId::new(),
            agent_id: None,
            sequence: 1,
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            event_type,
            action: "test".to_string(),
            details: serde_json::json!({}),
            files_affected: Vec::new(),
            gate_id: None,
            hmac: None,
        }
    }

    #[tokio::test]
    async fn publish_sync_invokes_matching_and_wildcard_handlers() {
        let bus = EventBus::new();
        let specific_hits = Arc::new(AtomicU32::new(0));
        let wildcard_hits = Arc::new(AtomicU32::new(0));

        let s = Arc::clone(&specific_hits);
        bus.subscribe(
            Some(EventType::LockAcquired),
            Arc::new(move |_event: Arc<AuditEvent>| {
                let s = Arc::clone(&s);
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        let w = Arc::clone(&wildcard_hits);
        bus.subscribe(
            None,
            Arc::new(move |_event: Arc<AuditEvent>| {
                let w = Arc::clone(&w);
                async move {
                    w.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        bus.publish_sync(sample_event(EventType::LockAcquired)).await;
        bus.publish_sync(sample_event(EventType::LockReleased)).await;

        assert_eq!(specific_hits.load(Ordering::SeqCst), 1);
        assert_eq!(wildcard_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn handler_errors_are_swallowed() {
        let bus = EventBus::new();
        bus.subscribe(
            None,
            Arc::new(|_event: Arc<AuditEvent>| async move { Err("boom".to_string()) }),
        );
        // Must not panic or propagate.
        bus.publish_sync(sample_event(EventType::Log)).await;
    }

    #[tokio::test]
    async fn publish_drains_through_background_consumer() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicU32::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe(
            None,
            Arc::new(move |_event: Arc<AuditEvent>| {
                let h = Arc::clone(&h);
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        bus.start().await;
        bus.publish(sample_event(EventType::Log));
        bus.publish(sample_event(EventType::Log));

        // Drain deterministically instead of sleeping: stop() only
        // returns once the queue (including our two events) is empty.
        bus.stop().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bus.pending_count(), 0);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let bus = Arc::new(EventBus::new());
        bus.start().await;
        bus.start().await;
        bus.stop().await;
        bus.stop().await;
    }
}
