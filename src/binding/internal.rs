//! Hooks shared by the binding's in-crate collaborators.
//!
//! Validation, composition and transforms need a few capabilities that are
//! not part of the public binding API. They reach them through this trait
//! instead of through the binding's private fields.

use futures::future::BoxFuture;

use super::field::Composition;
use super::result::{GetResult, Stage};
use super::FieldValue;

pub(crate) trait BindingInternals<T: FieldValue> {
    /// Read through the surface without running validators.
    fn get_raw(&self, stage: Stage) -> BoxFuture<'static, GetResult<T>>;

    /// Reset the template to absent and tell the surface.
    fn clear_template(&self);

    /// Run `hook` once when the binding is destroyed.
    fn on_destroy(&self, hook: impl FnOnce() + Send + 'static);

    /// The composition built over this binding, created by `init` on first use.
    fn composition(&self, init: impl FnOnce() -> Composition) -> Composition;
}
