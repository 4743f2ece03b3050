//! Field bindings: the state machine joining a controller and a surface.
//!
//! A [`FieldBinding`] starts unready. Reads and writes issued before a
//! [`Surface`] attaches park on a shared rendezvous and are replayed when
//! [`FieldBinding::ready`] runs. [`FieldBinding::destroy`] ends the binding.

pub(crate) mod detach;
pub mod field;
pub(crate) mod internal;
pub(crate) mod rendezvous;
pub mod result;
pub mod surface;
pub mod template;

pub use field::{BindingState, FieldBinding, WeakBinding};
pub use result::{GetResult, SetResult, Stage};
pub use surface::{FnSurface, GetterFn, SetterFn, Surface, TemplateSetterFn};
pub use template::Template;

/// Values a binding can carry.
pub trait FieldValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> FieldValue for T {}
