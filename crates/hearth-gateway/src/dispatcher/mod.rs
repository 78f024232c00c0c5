//! Event dispatcher
//!
//! Domain events from every shard go into one unbounded queue. A single
//! delivery task hands each event to the registered listeners in
//! registration order, so a slow listener delays later events but never the
//! shards' receive loops. A listener that fails or panics is logged and
//! skipped.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hearth_core::{DomainEvent, EventKind};

/// Receives domain events
#[async_trait]
pub trait EventListener: Send + Sync + 'static {
    async fn on_event(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Adapter for plain closures
struct FnListener<F>(F);

#[async_trait]
impl<F> EventListener for FnListener<F>
where
    F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn on_event(&self, event: &DomainEvent) -> anyhow::Result<()> {
        (self.0)(event)
    }
}

#[derive(Clone)]
struct Registration {
    /// `None` receives every event
    kind: Option<EventKind>,
    listener: Arc<dyn EventListener>,
}

struct Inner {
    tx: mpsc::UnboundedSender<DomainEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<DomainEvent>>>,
    listeners: RwLock<Vec<Registration>>,
    streams: Mutex<Vec<mpsc::UnboundedSender<DomainEvent>>>,
    cancel: CancellationToken,
}

/// Fan-out of domain events to listeners
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(Some(rx)),
                listeners: RwLock::new(Vec::new()),
                streams: Mutex::new(Vec::new()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Register a listener for every event
    pub fn register(&self, listener: Arc<dyn EventListener>) {
        self.inner.listeners.write().push(Registration { kind: None, listener });
    }

    /// Register a listener for one event type
    pub fn register_for(&self, kind: EventKind, listener: Arc<dyn EventListener>) {
        self.inner.listeners.write().push(Registration {
            kind: Some(kind),
            listener,
        });
    }

    /// Register a closure for one event type
    pub fn on<F>(&self, kind: EventKind, f: F)
    where
        F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_for(kind, Arc::new(FnListener(f)));
    }

    /// Receive a copy of every delivered event, after the listeners have run
    pub fn stream(&self) -> mpsc::UnboundedReceiver<DomainEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.streams.lock().push(tx);
        rx
    }

    /// Queue an event for delivery. Never blocks.
    pub fn emit(&self, event: DomainEvent) {
        tracing::trace!(event = event.event_type(), "Emitting event");
        if self.inner.tx.send(event).is_err() {
            tracing::debug!("Event dropped after dispatcher shutdown");
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Spawn the delivery task. Returns `None` if it is already running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let Some(rx) = self.inner.rx.lock().take() else {
            tracing::warn!("Event dispatcher is already running");
            return None;
        };
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            Self::run(inner, rx).await;
        });
        tracing::info!("Event dispatcher started");
        Some(handle)
    }

    /// Stop the delivery task once the events already queued are delivered
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    async fn run(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<DomainEvent>) {
        loop {
            tokio::select! {
                biased;

                event = rx.recv() => match event {
                    Some(event) => Self::deliver(&inner, event).await,
                    None => break,
                },
                () = inner.cancel.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        Self::deliver(&inner, event).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("Event dispatcher stopped");
    }

    async fn deliver(inner: &Inner, event: DomainEvent) {
        let kind = event.kind();
        // Snapshot so listeners may register further listeners
        let listeners: Vec<Registration> = inner
            .listeners
            .read()
            .iter()
            .filter(|registration| registration.kind.map_or(true, |k| k == kind))
            .cloned()
            .collect();

        for registration in listeners {
            let outcome = AssertUnwindSafe(registration.listener.on_event(&event))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(event = kind.as_str(), error = %err, "Listener failed");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(event = kind.as_str(), panic = %message, "Listener panicked");
                }
            }
        }

        inner
            .streams
            .lock()
            .retain(|stream| stream.send(event.clone()).is_ok());
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .field("running", &self.inner.rx.lock().is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::Snowflake;

    fn unavailable(id: u64) -> DomainEvent {
        DomainEvent::GuildUnavailable {
            guild_id: Snowflake::new(id),
        }
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventListener for Recorder {
        async fn on_event(&self, event: &DomainEvent) -> anyhow::Result<()> {
            self.log.lock().push(format!("{}:{}", self.name, event.event_type()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["a", "b"] {
            dispatcher.register(Arc::new(Recorder { name, log: log.clone() }));
        }
        let mut stream = dispatcher.stream();
        let task = dispatcher.start().unwrap();

        dispatcher.emit(unavailable(1));
        dispatcher.emit(DomainEvent::Resumed);
        stream.recv().await.unwrap();
        stream.recv().await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["a:GUILD_UNAVAILABLE", "b:GUILD_UNAVAILABLE", "a:RESUMED", "b:RESUMED"]
        );
        dispatcher.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_typed_registration_filters() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher.on(EventKind::GuildUnavailable, move |event| {
            sink.lock().push(event.guild_id());
            Ok(())
        });
        let mut stream = dispatcher.stream();
        dispatcher.start();

        dispatcher.emit(DomainEvent::Resumed);
        dispatcher.emit(unavailable(7));
        stream.recv().await.unwrap();
        stream.recv().await.unwrap();

        assert_eq!(*seen.lock(), vec![Some(Snowflake::new(7))]);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_listeners_are_isolated() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.on(EventKind::Resumed, |_| anyhow::bail!("boom"));
        dispatcher.on(EventKind::Resumed, |_| panic!("listener bug"));
        dispatcher.register(Arc::new(Recorder { name: "after", log: log.clone() }));
        let mut stream = dispatcher.stream();
        dispatcher.start();

        dispatcher.emit(DomainEvent::Resumed);
        dispatcher.emit(DomainEvent::Resumed);
        stream.recv().await.unwrap();
        stream.recv().await.unwrap();

        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_events() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(Arc::new(Recorder { name: "l", log: log.clone() }));

        for id in 0..5 {
            dispatcher.emit(unavailable(id));
        }
        dispatcher.shutdown();
        dispatcher.start().unwrap().await.unwrap();

        assert_eq!(log.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_start_twice() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start().is_some());
        assert!(dispatcher.start().is_none());
    }
}
