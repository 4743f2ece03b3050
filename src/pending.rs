//! Watch whether a binding's initial value is still loading.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::binding::{FieldBinding, FieldValue};
use crate::events::{FieldEvent, ListenerId};

/// Tracks `is_template_pending` for a binding through its
/// `template_change` events.
pub struct PendingWatch<T: FieldValue> {
    binding: FieldBinding<T>,
    pending: Arc<AtomicBool>,
    listener: ListenerId,
}

impl<T: FieldValue> PendingWatch<T> {
    pub fn new(binding: &FieldBinding<T>) -> Self {
        Self::build(binding, None)
    }

    /// Like [`new`](Self::new), calling `observer` whenever the flag flips.
    pub fn with_observer(
        binding: &FieldBinding<T>,
        observer: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        Self::build(binding, Some(Box::new(observer)))
    }

    fn build(
        binding: &FieldBinding<T>,
        observer: Option<Box<dyn Fn(bool) + Send + Sync>>,
    ) -> Self {
        let pending = Arc::new(AtomicBool::new(binding.is_template_pending()));

        let weak = binding.downgrade();
        let flag = pending.clone();
        let listener = binding.add_event_listener(FieldEvent::TemplateChange, move |_| {
            let Some(binding) = weak.upgrade() else {
                return;
            };
            let now = binding.is_template_pending();
            let before = flag.swap(now, Ordering::SeqCst);
            if before != now {
                if let Some(observer) = &observer {
                    observer(now);
                }
            }
        });

        Self {
            binding: binding.clone(),
            pending,
            listener,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

impl<T: FieldValue> Drop for PendingWatch<T> {
    fn drop(&mut self) {
        self.binding.remove_event_listener(self.listener);
    }
}

impl<T: FieldValue> fmt::Debug for PendingWatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingWatch")
            .field("pending", &self.is_pending())
            .finish()
    }
}
