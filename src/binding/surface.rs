//! The surface contract: what an input widget provides to drive a binding.
//!
//! A surface calls [`FieldBinding::ready`](super::FieldBinding::ready) once
//! per attachment and [`FieldBinding::destroy`](super::FieldBinding::destroy)
//! when it goes away.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::result::{GetResult, SetResult, Stage};
use super::template::Template;
use super::FieldValue;

/// Live storage for a binding's value.
#[async_trait]
pub trait Surface<T: FieldValue>: Send + Sync + 'static {
    /// Read the live value for `stage`.
    async fn get(&self, stage: Stage) -> GetResult<T>;

    /// Write the live value.
    async fn set(&self, value: T) -> SetResult;

    /// Apply a template update.
    ///
    /// Return `None` (the default) when the surface has no template handling
    /// of its own; the binding then falls back to [`set`](Self::set) when
    /// `execute_set` is true.
    async fn set_template(&self, _template: Template<T>, _execute_set: bool) -> Option<SetResult> {
        None
    }
}

// ---------------------------------------------------------------------------
// Closure-backed surface
// ---------------------------------------------------------------------------

/// Getter closure for [`FnSurface`].
pub type GetterFn<T> = Arc<dyn Fn(Stage) -> BoxFuture<'static, GetResult<T>> + Send + Sync>;
/// Setter closure for [`FnSurface`].
pub type SetterFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, SetResult> + Send + Sync>;
/// Template setter closure for [`FnSurface`].
pub type TemplateSetterFn<T> =
    Arc<dyn Fn(Template<T>, bool) -> BoxFuture<'static, SetResult> + Send + Sync>;

/// A surface assembled from a getter, a setter and an optional template
/// setter.
pub struct FnSurface<T: FieldValue> {
    getter: GetterFn<T>,
    setter: SetterFn<T>,
    template_setter: Option<TemplateSetterFn<T>>,
}

impl<T: FieldValue> FnSurface<T> {
    pub fn new(
        getter: impl Fn(Stage) -> BoxFuture<'static, GetResult<T>> + Send + Sync + 'static,
        setter: impl Fn(T) -> BoxFuture<'static, SetResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            getter: Arc::new(getter),
            setter: Arc::new(setter),
            template_setter: None,
        }
    }

    pub fn with_template_setter(
        mut self,
        template_setter: impl Fn(Template<T>, bool) -> BoxFuture<'static, SetResult>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.template_setter = Some(Arc::new(template_setter));
        self
    }
}

#[async_trait]
impl<T: FieldValue> Surface<T> for FnSurface<T> {
    async fn get(&self, stage: Stage) -> GetResult<T> {
        (self.getter)(stage).await
    }

    async fn set(&self, value: T) -> SetResult {
        (self.setter)(value).await
    }

    async fn set_template(&self, template: Template<T>, execute_set: bool) -> Option<SetResult> {
        match &self.template_setter {
            Some(ts) => Some(ts(template, execute_set).await),
            None => None,
        }
    }
}

impl<T: FieldValue> fmt::Debug for FnSurface<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSurface")
            .field("template_setter", &self.template_setter.is_some())
            .finish_non_exhaustive()
    }
}
