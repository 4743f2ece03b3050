//! An in-memory input widget.
//!
//! Stands in for a real widget in tests and headless use: it stores the
//! value, dispatches `change` and `blur` the way a widget would, and
//! destroys its binding on unmount.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::binding::{FieldBinding, FieldValue, GetResult, SetResult, Stage, Surface, WeakBinding};
use crate::events::FieldEvent;

struct InputState<T: FieldValue> {
    value: Mutex<T>,
    mounted: AtomicBool,
    binding: Mutex<Option<WeakBinding<T>>>,
}

impl<T: FieldValue> InputState<T> {
    fn dispatch(&self, event: FieldEvent) {
        let binding = self.binding.lock().as_ref().and_then(|weak| weak.upgrade());
        if let Some(binding) = binding {
            binding.dispatch_event(event);
        }
    }
}

/// A headless input holding its value in memory.
pub struct MemoryInput<T: FieldValue + PartialEq> {
    state: Arc<InputState<T>>,
}

impl<T: FieldValue + PartialEq> MemoryInput<T> {
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(InputState {
                value: Mutex::new(initial),
                mounted: AtomicBool::new(false),
                binding: Mutex::new(None),
            }),
        }
    }

    /// Attach to `binding`, replaying anything queued on it.
    pub async fn mount(&self, binding: &FieldBinding<T>) {
        *self.state.binding.lock() = Some(binding.downgrade());
        self.state.mounted.store(true, Ordering::SeqCst);
        binding
            .ready(InputSurface {
                state: self.state.clone(),
            })
            .await;
    }

    /// Simulate the user typing `value`.
    pub fn input(&self, value: T) {
        *self.state.value.lock() = value;
        self.state.dispatch(FieldEvent::Change);
    }

    /// Simulate the input losing focus.
    pub fn blur(&self) {
        self.state.dispatch(FieldEvent::Blur);
    }

    pub fn value(&self) -> T {
        self.state.value.lock().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.state.mounted.load(Ordering::SeqCst)
    }

    /// Detach and destroy the binding.
    pub fn unmount(&self) {
        self.state.mounted.store(false, Ordering::SeqCst);
        let binding = self.state.binding.lock().take().and_then(|weak| weak.upgrade());
        if let Some(binding) = binding {
            binding.destroy();
        }
    }
}

impl<T: FieldValue + PartialEq + Default> Default for MemoryInput<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: FieldValue + PartialEq + fmt::Debug> fmt::Debug for MemoryInput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryInput")
            .field("value", &*self.state.value.lock())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

struct InputSurface<T: FieldValue> {
    state: Arc<InputState<T>>,
}

#[async_trait]
impl<T: FieldValue + PartialEq> Surface<T> for InputSurface<T> {
    async fn get(&self, _stage: Stage) -> GetResult<T> {
        if !self.state.mounted.load(Ordering::SeqCst) {
            return GetResult::Unavailable;
        }
        GetResult::success(self.state.value.lock().clone())
    }

    async fn set(&self, value: T) -> SetResult {
        if !self.state.mounted.load(Ordering::SeqCst) {
            return SetResult::Unavailable;
        }
        let changed = {
            let mut current = self.state.value.lock();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };
        if changed {
            self.state.dispatch(FieldEvent::Change);
        }
        SetResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingState;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_mount_hydrates_from_template() {
        let binding = FieldBinding::resolved("initial".to_string());
        let input = MemoryInput::new(String::new());
        assert!(!input.is_mounted());
        input.mount(&binding).await;
        assert!(input.is_mounted());
        assert_eq!(input.value(), "initial");
        assert_eq!(binding.get(false).await, GetResult::success("initial".to_string()));
    }

    #[tokio::test]
    async fn test_programmatic_set_dispatches_change_once() {
        let binding = FieldBinding::<i64>::absent();
        let input = MemoryInput::default();
        input.mount(&binding).await;

        let changes = Arc::new(AtomicUsize::new(0));
        let c = changes.clone();
        binding.add_event_listener(FieldEvent::Change, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        binding.set(7).await;
        binding.set(7).await;
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(input.value(), 7);
    }

    #[tokio::test]
    async fn test_unmount_destroys_binding() {
        let binding = FieldBinding::<i64>::absent();
        let input = MemoryInput::new(1);
        input.mount(&binding).await;

        input.unmount();
        assert!(!input.is_mounted());
        assert_eq!(binding.state(), BindingState::Unavailable);
        assert_eq!(binding.get(false).await, GetResult::Unavailable);
    }

    #[tokio::test]
    async fn test_blur_dispatch() {
        let binding = FieldBinding::<i64>::absent();
        let input = MemoryInput::new(1);
        input.mount(&binding).await;
        let blurs = Arc::new(AtomicUsize::new(0));
        let b = blurs.clone();
        binding.add_event_listener(FieldEvent::Blur, move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });
        input.blur();
        assert_eq!(blurs.load(Ordering::SeqCst), 1);
    }
}
