//! Per-binding event bus.
//!
//! Every [`FieldBinding`](crate::binding::FieldBinding) owns one bus. Surfaces
//! dispatch `change` and `blur`; the binding itself dispatches
//! `template_change` whenever its template transitions. Dispatch is
//! synchronous and follows registration order.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The notifications a binding can carry. None of them has a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldEvent {
    /// The live value changed.
    Change,
    /// The surface lost focus.
    Blur,
    /// The binding's template moved to another state.
    TemplateChange,
}

impl fmt::Display for FieldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldEvent::Change => write!(f, "change"),
            FieldEvent::Blur => write!(f, "blur"),
            FieldEvent::TemplateChange => write!(f, "template_change"),
        }
    }
}

// ---------------------------------------------------------------------------
// Listener types
// ---------------------------------------------------------------------------

/// A synchronous event listener.
pub type Listener = Arc<dyn Fn(FieldEvent) + Send + Sync>;

static LISTENER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier returned by [`EventBus::on`], used to unregister.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(LISTENER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    event: FieldEvent,
    listener: Listener,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Synchronous pub/sub for [`FieldEvent`]s.
#[derive(Default)]
pub struct EventBus {
    entries: Mutex<Vec<ListenerEntry>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`.
    pub fn on(
        &self,
        event: FieldEvent,
        listener: impl Fn(FieldEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId::next();
        self.entries.lock().push(ListenerEntry {
            id,
            event,
            listener: Arc::new(listener),
        });
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Dispatch `event` to every listener registered for it.
    ///
    /// Listeners run after the registry lock is released, so they may
    /// register or unregister listeners themselves. A panicking listener is
    /// logged and does not stop the remaining ones.
    pub fn emit(&self, event: FieldEvent) {
        let listeners: Vec<Listener> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .filter(|e| e.event == event)
                .map(|e| e.listener.clone())
                .collect()
        };

        for listener in listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(event)));
            if let Err(e) = result {
                log::error!("[EventBus] Listener panic on '{}': {:?}", event, e);
            }
        }
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: FieldEvent) -> usize {
        self.entries.lock().iter().filter(|e| e.event == event).count()
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.entries.lock().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
