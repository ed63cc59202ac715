//! Typed publish/subscribe.
//!
//! Delivery is synchronous and eager: `publish` returns after every
//! registered handler for the event's type has run on the publishing
//! thread. Ordering among subscribers is unspecified. A panicking handler
//! is caught and logged; the remaining handlers still receive the event.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::symbol::SymbolInfo;

/// Contract every published event satisfies: a unique id, an occurrence
/// timestamp and the id of the aggregate it concerns. Events are immutable;
/// every property is set at construction.
pub trait Event: Any + Send + Sync {
    fn event_id(&self) -> Uuid;
    fn occurred_at(&self) -> DateTime<Utc>;
    fn aggregate_id(&self) -> String;
}

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Subscriber {
    id: String,
    handler: Handler,
}

/// Process-wide event bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<TypeId, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for events of type `E` under a caller-chosen id.
    /// Registration is idempotent per `(E, id)`: re-registering replaces
    /// the previous handler.
    pub fn subscribe<E: Event>(
        &self,
        handler_id: impl Into<String>,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) {
        let id = handler_id.into();
        let erased: Handler = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                handler(event);
            }
        });

        let mut table = self.subscribers.write();
        let entries = table.entry(TypeId::of::<E>()).or_default();
        if let Some(existing) = entries.iter_mut().find(|s| s.id == id) {
            existing.handler = erased;
        } else {
            entries.push(Subscriber { id, handler: erased });
        }
    }

    /// Remove the registration for `(E, id)`, if present.
    pub fn unsubscribe<E: Event>(&self, handler_id: &str) {
        let mut table = self.subscribers.write();
        if let Some(entries) = table.get_mut(&TypeId::of::<E>()) {
            entries.retain(|s| s.id != handler_id);
        }
    }

    /// Deliver `event` to every handler registered for its type.
    pub fn publish<E: Event>(&self, event: &E) {
        let handlers: Vec<Handler> = {
            let table = self.subscribers.read();
            table
                .get(&TypeId::of::<E>())
                .map(|entries| entries.iter().map(|s| Arc::clone(&s.handler)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!("event handler panicked; continuing delivery");
            }
        }
    }

    /// Number of registrations for an event type.
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscribers
            .read()
            .get(&TypeId::of::<E>())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Published once per processed source file, after its transaction commits.
#[derive(Debug, Clone)]
pub struct FileIndexedEvent {
    event_id: Uuid,
    occurred_at: DateTime<Utc>,
    path: PathBuf,
    symbols: Vec<SymbolInfo>,
    success: bool,
}

impl FileIndexedEvent {
    pub fn new(path: PathBuf, symbols: Vec<SymbolInfo>, success: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            path,
            symbols,
            success,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn symbols(&self) -> &[SymbolInfo] {
        &self.symbols
    }

    pub fn success(&self) -> bool {
        self.success
    }
}

impl Event for FileIndexedEvent {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn aggregate_id(&self) -> String {
        self.path.display().to_string()
    }
}

/// Published exactly once per workspace initialization, after every write
/// from that pass has committed.
#[derive(Debug, Clone)]
pub struct WorkspaceIndexedEvent {
    event_id: Uuid,
    occurred_at: DateTime<Utc>,
    workspace_path: PathBuf,
    total_files: u64,
    total_symbols: u64,
    duration_ms: u64,
}

impl WorkspaceIndexedEvent {
    pub fn new(
        workspace_path: PathBuf,
        total_files: u64,
        total_symbols: u64,
        duration_ms: u64,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            workspace_path,
            total_files,
            total_symbols,
            duration_ms,
        }
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    pub fn total_files(&self) -> u64 {
        self.total_files
    }

    pub fn total_symbols(&self) -> u64 {
        self.total_symbols
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

impl Event for WorkspaceIndexedEvent {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn aggregate_id(&self) -> String {
        self.workspace_path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn file_event() -> FileIndexedEvent {
        FileIndexedEvent::new(PathBuf::from("Foo.groovy"), Vec::new(), true)
    }

    #[test]
    fn test_delivery_to_matching_type_only() {
        let bus = EventBus::new();
        let file_hits = Arc::new(AtomicUsize::new(0));
        let ws_hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&file_hits);
        bus.subscribe::<FileIndexedEvent>("files", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&ws_hits);
        bus.subscribe::<WorkspaceIndexedEvent>("workspace", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&file_event());
        assert_eq!(file_hits.load(Ordering::SeqCst), 1);
        assert_eq!(ws_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_idempotent_per_identity() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&hits);
            bus.subscribe::<FileIndexedEvent>("same-id", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(bus.subscriber_count::<FileIndexedEvent>(), 1);
        bus.publish(&file_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_exact_registration() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe::<FileIndexedEvent>("gone", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        bus.unsubscribe::<FileIndexedEvent>("gone");
        bus.publish(&file_event());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe::<FileIndexedEvent>("bad", |_| panic!("boom"));
        let counter = Arc::clone(&hits);
        bus.subscribe::<FileIndexedEvent>("good", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&file_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_carry_identity() {
        let a = file_event();
        let b = file_event();
        assert_ne!(a.event_id(), b.event_id());
        assert_eq!(a.aggregate_id(), "Foo.groovy");
        assert!(a.occurred_at() <= Utc::now());
    }
}
