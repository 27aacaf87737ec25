//! Event handler trait + registry.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::HandlerError;
use crate::event::StreamEvent;

/// A consumer of one or more event types.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for each event of a type this handler was registered for.
    async fn handle(&self, event: &StreamEvent) -> Result<(), HandlerError>;

    /// Name used in logs when the handler fails.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapts a synchronous closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&StreamEvent) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&StreamEvent) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, event: &StreamEvent) -> Result<(), HandlerError> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Thread-safe mapping from event type to an ordered list of handlers.
///
/// Registration is additive and may happen from any thread at any time,
/// including while the stream client is dispatching.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event_type`. Handlers run in registration order.
    pub fn on_event(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(event_type.into()).or_default().push(handler);
    }

    /// Register a synchronous closure for `event_type`.
    pub fn on_fn<F>(&self, event_type: impl Into<String>, name: impl Into<String>, f: F)
    where
        F: Fn(&StreamEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on_event(event_type, Arc::new(FnHandler::new(name, f)));
    }

    /// Number of handlers registered for `event_type`.
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Event types with at least one handler.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Run every handler for `event.event_type`, in order.
    ///
    /// Failures (errors or panics) are logged and do not stop the remaining
    /// handlers. Returns the number of handlers that failed.
    pub async fn dispatch(&self, event: &StreamEvent) -> usize {
        let handlers = {
            let map = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            match map.get(&event.event_type) {
                Some(list) => list.clone(),
                None => {
                    tracing::trace!(event_type = %event.event_type, "no handlers registered");
                    return 0;
                }
            }
        };

        let mut failures = 0;
        for handler in handlers {
            let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(_) => HandlerError::Panicked {
                    handler: handler.name().to_string(),
                },
            };
            failures += 1;
            tracing::error!(
                event_type = %event.event_type,
                event_id = event.id.as_deref().unwrap_or(""),
                handler = handler.name(),
                error = %err,
                "event handler failed"
            );
        }
        failures
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct Counter(Arc<AtomicU32>);

    #[async_trait]
    impl EventHandler for Counter {
        async fn handle(&self, _e: &StreamEvent) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle(&self, _e: &StreamEvent) -> Result<(), HandlerError> {
            Err(HandlerError::failed("failing", "boom"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl EventHandler for Panicking {
        async fn handle(&self, _e: &StreamEvent) -> Result<(), HandlerError> {
            panic!("handler bug");
        }
    }

    fn event(t: &str) -> StreamEvent {
        StreamEvent::new(t, "{}")
    }

    #[tokio::test]
    async fn dispatch_to_matching_type_only() {
        let count = Arc::new(AtomicU32::new(0));
        let registry = HandlerRegistry::new();
        registry.on_event("job.level_up", Arc::new(Counter(count.clone())));

        assert_eq!(registry.dispatch(&event("job.level_up")).await, 0);
        assert_eq!(registry.dispatch(&event("gamble.completed")).await, 0);

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_the_next() {
        let count = Arc::new(AtomicU32::new(0));
        let registry = HandlerRegistry::new();
        registry.on_event("t", Arc::new(Failing));
        registry.on_event("t", Arc::new(Counter(count.clone())));

        assert_eq!(registry.dispatch(&event("t")).await, 1);
        assert_eq!(registry.dispatch(&event("t")).await, 1);
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let count = Arc::new(AtomicU32::new(0));
        let registry = HandlerRegistry::new();
        registry.on_event("t", Arc::new(Panicking));
        registry.on_event("t", Arc::new(Counter(count.clone())));

        assert_eq!(registry.dispatch(&event("t")).await, 1);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new();
        for i in 0..3 {
            let order = order.clone();
            registry.on_fn("t", format!("h{i}"), move |_| {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }
        registry.dispatch(&event("t")).await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(registry.handler_count("t"), 3);
        assert_eq!(registry.handler_count("other"), 0);
    }

    #[test]
    fn concurrent_registration() {
        let registry = Arc::new(HandlerRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.on_fn(if i % 2 == 0 { "a" } else { "b" }, "noop", |_| Ok(()));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.handler_count("a"), 4);
        assert_eq!(registry.handler_count("b"), 4);
        assert_eq!(registry.event_types(), vec!["a", "b"]);
    }
}
