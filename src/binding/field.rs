//! The field binding state machine.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{self, BoxFuture, FutureExt};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::detach::{eager, spawn_eager};
use super::internal::BindingInternals;
use super::rendezvous::Rendezvous;
use super::result::{GetResult, SetResult, Stage};
use super::surface::Surface;
use super::template::Template;
use super::FieldValue;
use crate::events::{EventBus, FieldEvent, ListenerId};
use crate::validation::{Failures, ValidatorId, ValidatorRegistry};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Observable lifecycle state of a [`FieldBinding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
    /// No surface attached yet; operations queue.
    Unready,
    /// A surface is attached.
    Ready,
    /// Destroyed. Terminal.
    Unavailable,
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingState::Unready => write!(f, "unready"),
            BindingState::Ready => write!(f, "ready"),
            BindingState::Unavailable => write!(f, "unavailable"),
        }
    }
}

enum State<T: FieldValue> {
    Unready(Arc<Rendezvous<T>>),
    Ready(Arc<dyn Surface<T>>),
    Unavailable,
}

impl<T: FieldValue> State<T> {
    fn kind(&self) -> BindingState {
        match self {
            State::Unready(_) => BindingState::Unready,
            State::Ready(_) => BindingState::Ready,
            State::Unavailable => BindingState::Unavailable,
        }
    }
}

type TeardownHook = Box<dyn FnOnce() + Send>;

pub(crate) type Composition = Arc<dyn Any + Send + Sync>;

pub(crate) struct Inner<T: FieldValue> {
    label: Option<String>,
    state: Mutex<State<T>>,
    template: Mutex<Template<T>>,
    pub(crate) validators: ValidatorRegistry<T>,
    events: EventBus,
    attach_seq: AtomicU64,
    /// `None` once the binding has been destroyed.
    teardown: Mutex<Option<Vec<TeardownHook>>>,
    composition: OnceCell<Composition>,
}

// ---------------------------------------------------------------------------
// FieldBinding
// ---------------------------------------------------------------------------

/// One addressable piece of form state, shared between a controller and the
/// surface that eventually attaches to it.
///
/// Cloning is cheap and every clone refers to the same binding.
///
/// `get`, `set` and `set_template` start work at call time: the call is
/// routed by the binding's state when it is made, not when the returned
/// future is first polled. `ready` is an ordinary `async fn`.
pub struct FieldBinding<T: FieldValue> {
    pub(crate) inner: Arc<Inner<T>>,
}

impl<T: FieldValue> Clone for FieldBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: FieldValue> FieldBinding<T> {
    /// Create an unready binding with `template`.
    pub fn new(template: Template<T>) -> Self {
        Self::build(template, None)
    }

    /// Create an unready binding whose template is `value`.
    pub fn resolved(value: T) -> Self {
        Self::new(Template::Resolved(value))
    }

    /// Create an unready binding whose initial value is still loading.
    pub fn pending() -> Self {
        Self::new(Template::Pending)
    }

    /// Create an unready binding without a template.
    pub fn absent() -> Self {
        Self::new(Template::Absent)
    }

    /// Create an unready binding with a label used in diagnostics.
    pub fn named(template: Template<T>, label: impl Into<String>) -> Self {
        Self::build(template, Some(label.into()))
    }

    fn build(template: Template<T>, label: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                label,
                state: Mutex::new(State::Unready(Arc::new(Rendezvous::new()))),
                template: Mutex::new(template),
                validators: ValidatorRegistry::new(),
                events: EventBus::new(),
                attach_seq: AtomicU64::new(0),
                teardown: Mutex::new(Some(Vec::new())),
                composition: OnceCell::new(),
            }),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    fn display_label(&self) -> &str {
        self.inner.label.as_deref().unwrap_or("<field>")
    }

    pub fn state(&self) -> BindingState {
        self.inner.state.lock().kind()
    }

    /// A clone of the current template.
    pub fn template(&self) -> Template<T> {
        self.inner.template.lock().clone()
    }

    pub fn is_template_pending(&self) -> bool {
        self.inner.template.lock().is_pending()
    }

    /// Whether both handles refer to the same binding.
    pub fn ptr_eq(&self, other: &FieldBinding<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakBinding<T> {
        WeakBinding {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read the value at the input stage, or the submit stage when `submit`.
    pub fn get(&self, submit: bool) -> BoxFuture<'static, GetResult<T>> {
        self.get_at(Stage::from_submit(submit))
    }

    /// Read the value and run the validators for `stage`.
    ///
    /// A raw success that fails any validator becomes
    /// [`GetResult::ValidationFault`]; other raw outcomes pass through
    /// without running validators.
    pub fn get_at(&self, stage: Stage) -> BoxFuture<'static, GetResult<T>> {
        let raw = self.get_raw(stage);
        let inner = self.inner.clone();
        async move {
            match raw.await {
                GetResult::Success { value } => inner.validators.run(stage, value).await,
                other => other,
            }
        }
        .boxed()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write the live value.
    ///
    /// While unready the value is kept for replay (last write wins) and the
    /// returned future resolves when a surface attaches.
    pub fn set(&self, value: T) -> BoxFuture<'static, SetResult> {
        let surface = match &*self.inner.state.lock() {
            State::Unavailable => return future::ready(SetResult::Unavailable).boxed(),
            State::Unready(rv) => {
                rv.record_set(value);
                return rv.set.wait();
            }
            State::Ready(surface) => surface.clone(),
        };
        eager(async move { surface.set(value).await }.boxed())
    }

    /// Resolve the template to `value` and pass it on to the surface.
    ///
    /// The template changes before this returns. With no template setter on
    /// the surface, `execute_set` decides whether the live value is written.
    pub fn set_template(&self, value: T, execute_set: bool) -> BoxFuture<'static, SetResult> {
        self.replace_template(Template::Resolved(value.clone()));

        let surface = match &*self.inner.state.lock() {
            State::Unavailable => return future::ready(SetResult::Unavailable).boxed(),
            State::Unready(rv) => {
                rv.record_template(value, execute_set);
                return rv.set_template.wait();
            }
            State::Ready(surface) => surface.clone(),
        };
        eager(async move { apply_template(surface.as_ref(), value, execute_set).await }.boxed())
    }

    /// Mark the template as pending, e.g. while an initial value reloads.
    pub fn mark_template_pending(&self) {
        self.replace_template(Template::Pending);
        self.notify_surface_template(Template::Pending);
    }

    fn replace_template(&self, template: Template<T>) {
        *self.inner.template.lock() = template;
        self.inner.events.emit(FieldEvent::TemplateChange);
    }

    fn notify_surface_template(&self, template: Template<T>) {
        if let Some(surface) = self.surface() {
            spawn_eager("template update", async move {
                let _ = surface.set_template(template, false).await;
            });
        }
    }

    fn surface(&self) -> Option<Arc<dyn Surface<T>>> {
        match &*self.inner.state.lock() {
            State::Ready(surface) => Some(surface.clone()),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Attach `surface`.
    ///
    /// The first attachment replays queued work onto the surface in the
    /// order set, get, set_template and resolves every queued caller. An
    /// attachment that arrives while another one is hydrating skips
    /// hydration. Whichever attachment was made last becomes the active
    /// surface. A destroyed binding ignores the call.
    pub async fn ready<S: Surface<T>>(&self, surface: S) {
        self.attach(Arc::new(surface)).await
    }

    pub(crate) async fn attach(&self, surface: Arc<dyn Surface<T>>) {
        let ticket = self.inner.attach_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let rendezvous = match &*self.inner.state.lock() {
            State::Unavailable => {
                log::debug!("[Binding] '{}' is destroyed, ignoring ready", self.display_label());
                return;
            }
            State::Unready(rv) if rv.begin_hydration() => Some(rv.clone()),
            State::Unready(_) => {
                log::debug!(
                    "[Binding] '{}' already hydrating, attaching without replay",
                    self.display_label()
                );
                None
            }
            State::Ready(_) => None,
        };

        if let Some(rv) = &rendezvous {
            log::trace!("[Binding] Hydrating '{}'", self.display_label());
            self.hydrate(rv, surface.as_ref()).await;
        }

        let installed = {
            let mut state = self.inner.state.lock();
            if matches!(*state, State::Unavailable) {
                false
            } else if self.inner.attach_seq.load(Ordering::SeqCst) != ticket {
                log::debug!(
                    "[Binding] '{}' was re-attached during hydration, keeping newer surface",
                    self.display_label()
                );
                false
            } else {
                *state = State::Ready(surface);
                true
            }
        };

        if installed {
            log::debug!("[Binding] '{}' ready", self.display_label());
        }

        if let Some(rv) = rendezvous {
            self.flush_late_writes(&rv).await;
        }
    }

    async fn hydrate(&self, rv: &Rendezvous<T>, surface: &dyn Surface<T>) {
        let initial = rv.take_value().or_else(|| self.template().into_resolved());
        if let Some(value) = initial {
            let result = surface.set(value).await;
            rv.set.resolve(result);
        }

        let current = surface.get(Stage::Input).await;
        rv.get.resolve(current);

        let result = match rv.take_template() {
            Some((value, execute_set)) => apply_template(surface, value, execute_set).await,
            None => SetResult::Success,
        };
        rv.set_template.resolve(result);
    }

    /// Writes recorded after their hydration step already ran.
    async fn flush_late_writes(&self, rv: &Rendezvous<T>) {
        if let Some(value) = rv.take_value() {
            log::trace!("[Binding] Flushing late set on '{}'", self.display_label());
            let result = self.set(value).await;
            rv.set.resolve(result);
        }
        if let Some((value, execute_set)) = rv.take_template() {
            log::trace!("[Binding] Flushing late template on '{}'", self.display_label());
            let result = match self.surface() {
                Some(surface) => apply_template(surface.as_ref(), value, execute_set).await,
                None => SetResult::Unavailable,
            };
            rv.set_template.resolve(result);
        }
    }

    /// Tear the binding down. Terminal and idempotent.
    ///
    /// Queued callers resolve to unavailable unless a hydration is in
    /// flight, in which case that hydration resolves them.
    pub fn destroy(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), State::Unavailable);
        match previous {
            State::Unavailable => return,
            State::Unready(rv) if !rv.is_hydrating() => rv.abandon(),
            _ => {}
        }
        log::debug!("[Binding] '{}' destroyed", self.display_label());

        let hooks = self.inner.teardown.lock().take().unwrap_or_default();
        for hook in hooks {
            hook();
        }
    }

    // -----------------------------------------------------------------------
    // Validators
    // -----------------------------------------------------------------------

    /// Register a validator run on every successful read.
    ///
    /// The validator gets the value and a [`Failures`] collector for the
    /// stage being evaluated.
    pub fn register_validator<V, F, Fut>(&self, validator: F) -> ValidatorId
    where
        V: Send + 'static,
        F: Fn(T, Failures<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.validators.register(Arc::new(move |stage: Stage, value: T| {
            let failures = Failures::new(stage);
            let run = validator(value, failures.clone());
            async move {
                run.await;
                failures.is_empty()
            }
            .boxed()
        }))
    }

    pub fn unregister_validator(&self, id: ValidatorId) -> bool {
        self.inner.validators.unregister(id)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn add_event_listener(
        &self,
        event: FieldEvent,
        listener: impl Fn(FieldEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.events.on(event, listener)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn dispatch_event(&self, event: FieldEvent) {
        self.inner.events.emit(event)
    }
}

impl<T: FieldValue> BindingInternals<T> for FieldBinding<T> {
    fn get_raw(&self, stage: Stage) -> BoxFuture<'static, GetResult<T>> {
        let surface = match &*self.inner.state.lock() {
            State::Unavailable => return future::ready(GetResult::Unavailable).boxed(),
            State::Unready(rv) => return rv.get.wait(),
            State::Ready(surface) => surface.clone(),
        };
        eager(async move { surface.get(stage).await }.boxed())
    }

    fn clear_template(&self) {
        self.replace_template(Template::Absent);
        self.notify_surface_template(Template::Absent);
    }

    fn on_destroy(&self, hook: impl FnOnce() + Send + 'static) {
        let hook: TeardownHook = Box::new(hook);
        let hook = {
            let mut slot = self.inner.teardown.lock();
            match slot.as_mut() {
                Some(hooks) => {
                    hooks.push(hook);
                    None
                }
                None => Some(hook),
            }
        };
        if let Some(hook) = hook {
            hook();
        }
    }

    fn composition(&self, init: impl FnOnce() -> Composition) -> Composition {
        self.inner.composition.get_or_init(init).clone()
    }
}

/// Apply a resolved template through `surface`, falling back to its setter.
async fn apply_template<T: FieldValue>(
    surface: &dyn Surface<T>,
    value: T,
    execute_set: bool,
) -> SetResult {
    match surface.set_template(Template::Resolved(value.clone()), execute_set).await {
        Some(result) => result,
        None if execute_set => surface.set(value).await,
        None => SetResult::Success,
    }
}

impl<T: FieldValue> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .field("validators", &self.inner.validators.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// WeakBinding
// ---------------------------------------------------------------------------

/// A non-owning handle, held by listeners that must not keep a binding alive.
pub struct WeakBinding<T: FieldValue> {
    inner: Weak<Inner<T>>,
}

impl<T: FieldValue> WeakBinding<T> {
    pub fn upgrade(&self) -> Option<FieldBinding<T>> {
        self.inner.upgrade().map(|inner| FieldBinding { inner })
    }
}

impl<T: FieldValue> Clone for WeakBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: FieldValue> fmt::Debug for WeakBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBinding")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::FnSurface;
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_pending, assert_ready_eq};

    /// Surface storing a value in memory and counting calls.
    #[derive(Clone, Default)]
    struct Recorder {
        value: Arc<Mutex<Option<String>>>,
        gets: Arc<AtomicUsize>,
        sets: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn with(value: &str) -> Self {
            let r = Self::default();
            *r.value.lock() = Some(value.to_string());
            r
        }

        fn surface(&self) -> FnSurface<String> {
            let (gv, gets) = (self.value.clone(), self.gets.clone());
            let (sv, sets) = (self.value.clone(), self.sets.clone());
            FnSurface::new(
                move |_stage| {
                    gets.fetch_add(1, Ordering::SeqCst);
                    let out = match gv.lock().clone() {
                        Some(v) => GetResult::success(v),
                        None => GetResult::Unavailable,
                    };
                    future::ready(out).boxed()
                },
                move |value| {
                    sets.fetch_add(1, Ordering::SeqCst);
                    *sv.lock() = Some(value);
                    future::ready(SetResult::Success).boxed()
                },
            )
        }
    }

    #[tokio::test]
    async fn test_get_pending_until_ready() {
        let binding = FieldBinding::resolved("initial".to_string());
        let mut get = tokio_test::task::spawn(binding.get(false));
        assert_pending!(get.poll());

        let surface = Recorder::default();
        binding.ready(surface.surface()).await;

        assert!(get.is_woken());
        assert_ready_eq!(get.poll(), GetResult::success("initial".to_string()));
        assert_eq!(binding.state(), BindingState::Ready);
    }

    #[tokio::test]
    async fn test_queued_ops_share_one_resolution() {
        let binding = FieldBinding::<String>::absent();
        let set_a = binding.set("a".into());
        let set_b = binding.set("b".into());
        let get_a = binding.get(false);
        let get_b = binding.get(false);

        let surface = Recorder::default();
        binding.ready(surface.surface()).await;

        assert_eq!(set_a.await, SetResult::Success);
        assert_eq!(set_b.await, SetResult::Success);
        assert_eq!(get_a.await, GetResult::success("b".to_string()));
        assert_eq!(get_b.await, GetResult::success("b".to_string()));
        assert_eq!(surface.sets.load(Ordering::SeqCst), 1);
        assert_eq!(surface.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replay_set_overrides_template() {
        let binding = FieldBinding::resolved("template".to_string());
        let _queued = binding.set("typed".into());
        let surface = Recorder::default();
        binding.ready(surface.surface()).await;
        assert_eq!(surface.value.lock().as_deref(), Some("typed"));
    }

    #[tokio::test]
    async fn test_destroy_before_ready_resolves_unavailable() {
        let binding = FieldBinding::<String>::absent();
        let get = binding.get(true);
        let set = binding.set("x".into());
        let tpl = binding.set_template("t".into(), true);

        binding.destroy();

        assert_eq!(get.await, GetResult::Unavailable);
        assert_eq!(set.await, SetResult::Unavailable);
        assert_eq!(tpl.await, SetResult::Unavailable);
        assert_eq!(binding.state(), BindingState::Unavailable);
        assert_eq!(binding.get(false).await, GetResult::Unavailable);
    }

    #[tokio::test]
    async fn test_destroy_when_ready_leaves_surface_alone() {
        let binding = FieldBinding::<String>::absent();
        let surface = Recorder::with("kept");
        binding.ready(surface.surface()).await;
        let (gets, sets) = (surface.gets.load(Ordering::SeqCst), surface.sets.load(Ordering::SeqCst));

        binding.destroy();
        binding.destroy();

        assert_eq!(binding.set("x".into()).await, SetResult::Unavailable);
        assert_eq!(surface.gets.load(Ordering::SeqCst), gets);
        assert_eq!(surface.sets.load(Ordering::SeqCst), sets);
        assert_eq!(surface.value.lock().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_destroyed_binding_ignores_ready() {
        let binding = FieldBinding::resolved("v".to_string());
        binding.destroy();
        let surface = Recorder::default();
        binding.ready(surface.surface()).await;
        assert_eq!(binding.state(), BindingState::Unavailable);
        assert_eq!(surface.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_ready_during_hydration_skips_replay() {
        let binding = FieldBinding::resolved("seed".to_string());
        let (release, gate) = futures::channel::oneshot::channel::<()>();
        let gate = gate.shared();
        let first_sets = Arc::new(AtomicUsize::new(0));

        let fs = first_sets.clone();
        let slow = FnSurface::new(
            |_stage| future::ready(GetResult::success("slow".to_string())).boxed(),
            move |_value| {
                fs.fetch_add(1, Ordering::SeqCst);
                let gate = gate.clone();
                async move {
                    let _ = gate.await;
                    SetResult::Success
                }
                .boxed()
            },
        );

        let first = {
            let b = binding.clone();
            tokio::spawn(async move { b.ready(slow).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(first_sets.load(Ordering::SeqCst), 1);

        let second = Recorder::with("second");
        binding.ready(second.surface()).await;
        assert_eq!(second.sets.load(Ordering::SeqCst), 0);
        assert_eq!(second.gets.load(Ordering::SeqCst), 0);
        assert_eq!(binding.state(), BindingState::Ready);

        release.send(()).unwrap();
        first.await.unwrap();

        assert_eq!(first_sets.load(Ordering::SeqCst), 1);
        assert_eq!(binding.get(false).await, GetResult::success("second".to_string()));
    }

    #[tokio::test]
    async fn test_destroy_during_hydration_lets_hydration_resolve() {
        let binding = FieldBinding::resolved("seed".to_string());
        let queued = binding.get(false);
        let (release, gate) = futures::channel::oneshot::channel::<()>();
        let gate = gate.shared();
        let slow = FnSurface::new(
            |_stage| future::ready(GetResult::success("live".to_string())).boxed(),
            move |_value| {
                let gate = gate.clone();
                async move {
                    let _ = gate.await;
                    SetResult::Success
                }
                .boxed()
            },
        );

        let attach = {
            let b = binding.clone();
            tokio::spawn(async move { b.ready(slow).await })
        };
        tokio::task::yield_now().await;

        binding.destroy();
        assert_eq!(binding.state(), BindingState::Unavailable);
        assert_eq!(binding.get(false).await, GetResult::Unavailable);

        release.send(()).unwrap();
        attach.await.unwrap();
        assert_eq!(queued.await, GetResult::success("live".to_string()));
        assert_eq!(binding.state(), BindingState::Unavailable);
    }

    #[tokio::test]
    async fn test_set_during_hydration_is_flushed() {
        let binding = FieldBinding::<String>::absent();
        let (release, gate) = futures::channel::oneshot::channel::<()>();
        let gate = gate.shared();
        let value = Arc::new(Mutex::new("live".to_string()));
        let entered = Arc::new(AtomicUsize::new(0));

        let (gv, sv, e) = (value.clone(), value.clone(), entered.clone());
        let surface = FnSurface::new(
            move |_stage| {
                e.fetch_add(1, Ordering::SeqCst);
                let (gate, gv) = (gate.clone(), gv.clone());
                async move {
                    let _ = gate.await;
                    GetResult::success(gv.lock().clone())
                }
                .boxed()
            },
            move |v| {
                *sv.lock() = v;
                future::ready(SetResult::Success).boxed()
            },
        );

        let attach = {
            let b = binding.clone();
            tokio::spawn(async move { b.ready(surface).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(entered.load(Ordering::SeqCst), 1);

        let late = binding.set("late".into());
        assert_eq!(binding.state(), BindingState::Unready);

        release.send(()).unwrap();
        attach.await.unwrap();
        assert_eq!(late.await, SetResult::Success);
        assert_eq!(*value.lock(), "late");
        assert_eq!(binding.state(), BindingState::Ready);
    }

    #[tokio::test]
    async fn test_template_during_hydration_is_flushed() {
        let binding = FieldBinding::<String>::absent();
        let (release, gate) = futures::channel::oneshot::channel::<()>();
        let gate = gate.shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let surface = Recorder::with("live").surface().with_template_setter(move |template, execute| {
            s.lock().push((template, execute));
            let gate = gate.clone();
            async move {
                let _ = gate.await;
                SetResult::Success
            }
            .boxed()
        });

        let first = binding.set_template("first".into(), false);
        let attach = {
            let b = binding.clone();
            tokio::spawn(async move { b.ready(surface).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(seen.lock().len(), 1);

        let second = binding.set_template("second".into(), false);
        release.send(()).unwrap();
        attach.await.unwrap();

        assert_eq!(first.await, SetResult::Success);
        assert_eq!(second.await, SetResult::Success);
        assert_eq!(
            *seen.lock(),
            vec![
                (Template::Resolved("first".to_string()), false),
                (Template::Resolved("second".to_string()), false),
            ]
        );
        assert_eq!(binding.template(), Template::Resolved("second".to_string()));
    }

    #[tokio::test]
    async fn test_set_template_without_template_setter() {
        let binding = FieldBinding::<String>::absent();
        let surface = Recorder::with("live");
        binding.ready(surface.surface()).await;

        assert_eq!(binding.set_template("quiet".into(), false).await, SetResult::Success);
        assert_eq!(surface.value.lock().as_deref(), Some("live"));
        assert_eq!(binding.template(), Template::Resolved("quiet".to_string()));

        assert_eq!(binding.set_template("loud".into(), true).await, SetResult::Success);
        assert_eq!(surface.value.lock().as_deref(), Some("loud"));
    }

    #[tokio::test]
    async fn test_queued_template_replayed_after_get() {
        let binding = FieldBinding::<String>::absent();
        let tpl = binding.set_template("t".into(), false);
        let get = binding.get(false);

        let surface = Recorder::with("live");
        binding.ready(surface.surface()).await;

        assert_eq!(tpl.await, SetResult::Success);
        // the template also seeds the live value in step one
        assert_eq!(get.await, GetResult::success("t".to_string()));
    }

    #[tokio::test]
    async fn test_template_changes_dispatch_events() {
        let binding = FieldBinding::<String>::absent();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        binding.add_event_listener(FieldEvent::TemplateChange, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        binding.mark_template_pending();
        assert!(binding.is_template_pending());
        let _queued = binding.set_template("v".into(), false);
        assert!(!binding.is_template_pending());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mark_pending_reaches_template_setter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let surface = Recorder::default().surface().with_template_setter(move |template, execute| {
            s.lock().push((template, execute));
            future::ready(SetResult::Success).boxed()
        });
        let binding = FieldBinding::<String>::absent();
        binding.ready(surface).await;

        binding.mark_template_pending();
        assert_eq!(*seen.lock(), vec![(Template::Pending, false)]);
    }

    #[tokio::test]
    async fn test_validators_downgrade_success() {
        let binding = FieldBinding::<String>::absent();
        binding.ready(Recorder::with("").surface()).await;

        let id = binding.register_validator(|value: String, fail: Failures<String>| async move {
            if value.is_empty() {
                fail.fail_at("required", Stage::Blur);
            }
        });

        assert!(binding.get_at(Stage::Input).await.is_success());
        assert_eq!(binding.get_at(Stage::Blur).await, GetResult::ValidationFault);
        assert_eq!(binding.get(true).await, GetResult::ValidationFault);

        assert!(binding.unregister_validator(id));
        assert!(binding.get(true).await.is_success());
    }

    #[tokio::test]
    async fn test_validators_skip_unavailable() {
        let binding = FieldBinding::<String>::absent();
        binding.ready(Recorder::default().surface()).await;
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        binding.register_validator(move |_value: String, _fail: Failures<String>| {
            r.fetch_add(1, Ordering::SeqCst);
            async {}
        });

        assert_eq!(binding.get(true).await, GetResult::Unavailable);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_on_destroy_runs_once() {
        let binding = FieldBinding::<u8>::absent();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        binding.on_destroy(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        binding.destroy();
        binding.destroy();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let h = hits.clone();
        binding.on_destroy(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_weak_binding() {
        let binding = FieldBinding::<u8>::pending();
        let weak = binding.downgrade();
        assert!(weak.upgrade().is_some_and(|b| b.ptr_eq(&binding)));
        drop(binding);
        assert!(weak.upgrade().is_none());
    }
}
