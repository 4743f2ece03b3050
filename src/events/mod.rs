//! Binding event system.
//!
//! Each binding owns an [`EventBus`] carrying `change`, `blur` and
//! `template_change`. Compositions and transforms forward their children's
//! `change`/`blur` to the parent bus so listeners on an outer binding see
//! activity anywhere underneath it.

pub mod event_bus;

pub use event_bus::{EventBus, FieldEvent, Listener, ListenerId};
