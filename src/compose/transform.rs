//! Present a binding of one type as a binding of another.
//!
//! [`transform`] builds an inner binding of type `U` and attaches a surface
//! to the outer binding of type `T` that converts on the way through.
//! The inner binding is what input widgets attach to.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use crate::binding::detach::{spawn_detached, spawn_eager};
use crate::binding::internal::BindingInternals;
use crate::binding::{FieldBinding, FieldValue, GetResult, SetResult, Stage, Surface, Template};
use crate::error::{BindingError, Direction};
use crate::events::FieldEvent;

/// An async, fallible conversion.
pub type ConvertFn<A, B> = Arc<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<B>> + Send + Sync>;

/// A pair of conversions between an outer type `T` and an inner type `U`.
pub struct Transform<T, U> {
    forward: ConvertFn<T, U>,
    backward: ConvertFn<U, T>,
}

impl<T, U> Clone for Transform<T, U> {
    fn clone(&self) -> Self {
        Self {
            forward: self.forward.clone(),
            backward: self.backward.clone(),
        }
    }
}

impl<T: FieldValue, U: FieldValue> Transform<T, U> {
    pub fn new<F, FFut, B, BFut>(forward: F, backward: B) -> Self
    where
        F: Fn(T) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = anyhow::Result<U>> + Send + 'static,
        B: Fn(U) -> BFut + Send + Sync + 'static,
        BFut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            forward: Arc::new(move |value: T| forward(value).boxed()),
            backward: Arc::new(move |value: U| backward(value).boxed()),
        }
    }

    /// Build a transform from synchronous conversions.
    pub fn sync(
        forward: impl Fn(T) -> anyhow::Result<U> + Send + Sync + 'static,
        backward: impl Fn(U) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            move |value| futures::future::ready(forward(value)),
            move |value| futures::future::ready(backward(value)),
        )
    }
}

impl<T, U> fmt::Debug for Transform<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").finish_non_exhaustive()
    }
}

/// Create the inner binding for `outer` and attach the converting surface.
///
/// The inner template follows the outer one: pending and absent carry over,
/// a resolved outer template starts the inner one pending until `forward`
/// finishes. Inner `change`/`blur` are re-dispatched on `outer`, and
/// destroying `outer` destroys the inner binding.
pub fn transform<T: FieldValue, U: FieldValue>(
    outer: &FieldBinding<T>,
    config: Transform<T, U>,
) -> FieldBinding<U> {
    let label = outer.label().unwrap_or("<transform>").to_string();

    let seed = outer.template();
    let inner_template = match &seed {
        Template::Absent => Template::Absent,
        Template::Pending | Template::Resolved(_) => Template::Pending,
    };
    let inner = FieldBinding::named(inner_template, label.clone());

    if let Template::Resolved(value) = seed {
        let (target, forward, field) = (inner.clone(), config.forward.clone(), label.clone());
        spawn_eager("transform template", async move {
            match forward(value).await {
                Ok(converted) => {
                    target.set_template(converted, false).await;
                }
                Err(e) => log_failure(BindingError::conversion(Direction::Forward, field, e)),
            }
        });
    }

    for event in [FieldEvent::Change, FieldEvent::Blur] {
        let weak = outer.downgrade();
        inner.add_event_listener(event, move |event| {
            if let Some(outer) = weak.upgrade() {
                outer.dispatch_event(event);
            }
        });
    }

    let owned = inner.clone();
    outer.on_destroy(move || owned.destroy());

    let surface = TransformSurface {
        inner: inner.clone(),
        config,
        label,
    };
    let target = outer.clone();
    spawn_detached("transform attach", async move { target.ready(surface).await });

    inner
}

impl<T: FieldValue> FieldBinding<T> {
    /// Present this binding as a binding of `U`. See [`transform`].
    pub fn transform<U: FieldValue>(&self, config: Transform<T, U>) -> FieldBinding<U> {
        transform(self, config)
    }
}

fn log_failure(error: BindingError) {
    log::error!("[Transform] {}", error);
}

// ---------------------------------------------------------------------------
// TransformSurface
// ---------------------------------------------------------------------------

struct TransformSurface<T, U: FieldValue> {
    inner: FieldBinding<U>,
    config: Transform<T, U>,
    label: String,
}

impl<T: FieldValue, U: FieldValue> TransformSurface<T, U> {
    async fn forward(&self, value: T) -> Option<U> {
        match (self.config.forward)(value).await {
            Ok(converted) => Some(converted),
            Err(e) => {
                log_failure(BindingError::conversion(Direction::Forward, &self.label, e));
                None
            }
        }
    }
}

#[async_trait]
impl<T: FieldValue, U: FieldValue> Surface<T> for TransformSurface<T, U> {
    async fn get(&self, stage: Stage) -> GetResult<T> {
        match self.inner.get_at(stage).await {
            GetResult::Success { value } => match (self.config.backward)(value).await {
                Ok(converted) => GetResult::success(converted),
                Err(e) => {
                    log_failure(BindingError::conversion(Direction::Backward, &self.label, e));
                    GetResult::Unavailable
                }
            },
            GetResult::ValidationFault => GetResult::ValidationFault,
            GetResult::Unavailable => GetResult::Unavailable,
        }
    }

    async fn set(&self, value: T) -> SetResult {
        match self.forward(value).await {
            Some(converted) => self.inner.set(converted).await,
            None => SetResult::Unavailable,
        }
    }

    async fn set_template(&self, template: Template<T>, execute_set: bool) -> Option<SetResult> {
        let result = match template {
            Template::Resolved(value) => match self.forward(value).await {
                Some(converted) => self.inner.set_template(converted, execute_set).await,
                None => SetResult::Unavailable,
            },
            Template::Pending => {
                self.inner.mark_template_pending();
                SetResult::Success
            }
            Template::Absent => {
                self.inner.clear_template();
                SetResult::Success
            }
        };
        Some(result)
    }
}
