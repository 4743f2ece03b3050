//! A validator attached to a binding that keeps its latest failure list.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;

use super::pipeline::{Failures, ValidatorId};
use crate::binding::detach::spawn_eager;
use crate::binding::internal::BindingInternals;
use crate::binding::{FieldBinding, FieldValue, GetResult, Stage, WeakBinding};
use crate::events::{FieldEvent, ListenerId};

type CheckFn<T, V> = Arc<dyn Fn(T, Failures<V>) -> BoxFuture<'static, ()> + Send + Sync>;
type Observer<V> = Arc<dyn Fn(&[V]) + Send + Sync>;

struct Checker<T, V> {
    check: CheckFn<T, V>,
    errors: Mutex<Vec<V>>,
    observer: Option<Observer<V>>,
}

impl<T: FieldValue, V: Clone + Send + Sync + 'static> Checker<T, V> {
    async fn run(&self, stage: Stage, value: T) -> bool {
        let failures = Failures::new(stage);
        (self.check)(value, failures.clone()).await;
        let errors = failures.take();
        let passed = errors.is_empty();
        self.publish(errors);
        passed
    }

    fn publish(&self, errors: Vec<V>) {
        let snapshot = self.observer.as_ref().map(|_| errors.clone());
        *self.errors.lock() = errors;
        if let (Some(observer), Some(errors)) = (&self.observer, snapshot) {
            observer(&errors);
        }
    }
}

/// Re-evaluate `checker` against the binding's raw value at `stage`.
fn rerun<T, V>(binding: &FieldBinding<T>, checker: Arc<Checker<T, V>>, stage: Stage)
where
    T: FieldValue,
    V: Clone + Send + Sync + 'static,
{
    let raw = binding.get_raw(stage);
    spawn_eager("validation rerun", async move {
        match raw.await {
            GetResult::Success { value } => {
                checker.run(stage, value).await;
            }
            _ => checker.publish(Vec::new()),
        }
    });
}

/// A validator registered on a binding, with its current failure list.
///
/// The list refreshes on every `get` through the binding, on `change`
/// (input stage) and on `blur` (blur stage). Dropping the handle
/// unregisters the validator.
pub struct Validation<T: FieldValue, V: Clone + Send + Sync + 'static> {
    binding: FieldBinding<T>,
    checker: Arc<Checker<T, V>>,
    validator: ValidatorId,
    listeners: [ListenerId; 2],
}

impl<T, V> Validation<T, V>
where
    T: FieldValue,
    V: Clone + Send + Sync + 'static,
{
    /// Register `validator` on `binding` and evaluate it once.
    pub fn attach<F, Fut>(binding: &FieldBinding<T>, validator: F) -> Self
    where
        F: Fn(T, Failures<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::build(binding, validator, None)
    }

    /// Like [`attach`](Self::attach), calling `observer` with every new list.
    pub fn attach_observed<F, Fut>(
        binding: &FieldBinding<T>,
        validator: F,
        observer: impl Fn(&[V]) + Send + Sync + 'static,
    ) -> Self
    where
        F: Fn(T, Failures<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::build(binding, validator, Some(Arc::new(observer)))
    }

    fn build<F, Fut>(binding: &FieldBinding<T>, validator: F, observer: Option<Observer<V>>) -> Self
    where
        F: Fn(T, Failures<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let checker = Arc::new(Checker {
            check: Arc::new(move |value: T, failures: Failures<V>| validator(value, failures).boxed()),
            errors: Mutex::new(Vec::new()),
            observer,
        });

        let registered = checker.clone();
        let id = binding.inner.validators.register(Arc::new(move |stage: Stage, value: T| {
            let checker = registered.clone();
            async move { checker.run(stage, value).await }.boxed()
        }));

        let listeners = [(FieldEvent::Change, Stage::Input), (FieldEvent::Blur, Stage::Blur)].map(
            |(event, stage)| {
                let weak: WeakBinding<T> = binding.downgrade();
                let checker = checker.clone();
                binding.add_event_listener(event, move |_| {
                    if let Some(binding) = weak.upgrade() {
                        rerun(&binding, checker.clone(), stage);
                    }
                })
            },
        );

        rerun(binding, checker.clone(), Stage::Input);

        Self {
            binding: binding.clone(),
            checker,
            validator: id,
            listeners,
        }
    }

    /// The failures found by the latest evaluation.
    pub fn errors(&self) -> Vec<V> {
        self.checker.errors.lock().clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.checker.errors.lock().is_empty()
    }

    pub fn binding(&self) -> &FieldBinding<T> {
        &self.binding
    }
}

impl<T, V> Drop for Validation<T, V>
where
    T: FieldValue,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.binding.unregister_validator(self.validator);
        for id in self.listeners {
            self.binding.remove_event_listener(id);
        }
    }
}

impl<T, V> fmt::Debug for Validation<T, V>
where
    T: FieldValue,
    V: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("validator", &self.validator)
            .field("errors", &*self.checker.errors.lock())
            .finish()
    }
}

impl<T: FieldValue> FieldBinding<T> {
    /// Attach a validator and keep its failure list. See [`Validation`].
    pub fn validate<V, F, Fut>(&self, validator: F) -> Validation<T, V>
    where
        V: Clone + Send + Sync + 'static,
        F: Fn(T, Failures<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Validation::attach(self, validator)
    }
}
