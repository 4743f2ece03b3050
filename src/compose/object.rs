//! Object composition: a record binding backed by one child binding per key.
//!
//! Children are created on first lookup through [`ObjectFields::field`] and
//! never removed. Once [`ObjectFields::attach`] is called the composition is
//! the parent's surface, so reading the parent assembles a record from the
//! children and writing it fans out to them.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use super::record::Record;
use crate::binding::detach::spawn_eager;
use crate::binding::field::Composition;
use crate::binding::internal::BindingInternals;
use crate::binding::{
    BindingState, FieldBinding, FieldValue, GetResult, SetResult, Stage, Surface, Template,
};
use crate::config::config;
use crate::events::{FieldEvent, ListenerId};

// ---------------------------------------------------------------------------
// Children
// ---------------------------------------------------------------------------

struct Child<F: FieldValue> {
    key: String,
    binding: FieldBinding<F>,
    forwarding: [ListenerId; 2],
}

/// Insertion-ordered, add-only map of key to child binding.
struct Children<F: FieldValue> {
    entries: Mutex<Vec<Child<F>>>,
    attached: AtomicBool,
}

impl<F: FieldValue> Children<F> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            attached: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> Vec<(String, FieldBinding<F>)> {
        self.entries
            .lock()
            .iter()
            .map(|c| (c.key.clone(), c.binding.clone()))
            .collect()
    }

    fn destroy_all(&self) {
        let children: Vec<(FieldBinding<F>, [ListenerId; 2])> = self
            .entries
            .lock()
            .iter()
            .map(|c| (c.binding.clone(), c.forwarding))
            .collect();
        for (binding, forwarding) in children {
            for id in forwarding {
                binding.remove_event_listener(id);
            }
            binding.destroy();
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectFields
// ---------------------------------------------------------------------------

/// Per-key access to a record binding.
pub struct ObjectFields<R: Record> {
    parent: FieldBinding<R>,
    children: Arc<Children<R::Field>>,
}

impl<R: Record> Clone for ObjectFields<R> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            children: self.children.clone(),
        }
    }
}

impl<R: Record> ObjectFields<R> {
    /// The composition over `parent`.
    ///
    /// Every call for the same parent shares one set of children. Destroying
    /// the parent destroys every child.
    pub fn new(parent: &FieldBinding<R>) -> Self {
        let shared = parent.composition(|| Self::compose(parent) as Composition);
        let children = match shared.downcast::<Children<R::Field>>() {
            Ok(children) => children,
            Err(_) => {
                log::error!(
                    "[ObjectFields] '{}' already carries a different composition",
                    parent.label().unwrap_or("<object>")
                );
                Self::compose(parent)
            }
        };
        Self {
            parent: parent.clone(),
            children,
        }
    }

    fn compose(parent: &FieldBinding<R>) -> Arc<Children<R::Field>> {
        let children = Arc::new(Children::new());
        let owned = children.clone();
        parent.on_destroy(move || owned.destroy_all());
        children
    }

    /// Attach the composition to the parent.
    ///
    /// Operations queued on the parent hydrate against the fields looked up
    /// before this call. Look up the fields first, then attach; later calls
    /// do nothing.
    pub fn attach(&self) {
        if self.children.attached.swap(true, Ordering::SeqCst) {
            return;
        }
        let surface = ObjectSurface::<R> {
            children: self.children.clone(),
            label: self.parent.label().unwrap_or("<object>").to_string(),
        };
        let target = self.parent.clone();
        spawn_eager("object attach", async move { target.ready(surface).await });
    }

    pub fn is_attached(&self) -> bool {
        self.children.attached.load(Ordering::SeqCst)
    }

    /// The binding for `key`, created on first lookup.
    ///
    /// A new child's template comes from the parent's current template:
    /// pending stays pending, a resolved record yields its field (absent
    /// when the key is missing), absent stays absent.
    pub fn field(&self, key: &str) -> FieldBinding<R::Field> {
        let child = {
            let mut entries = self.children.entries.lock();
            if let Some(existing) = entries.iter().find(|c| c.key == key) {
                return existing.binding.clone();
            }

            let template = self.parent.template().and_then(|record| record.field(key));
            let label = match self.parent.label() {
                Some(parent) => format!("{parent}.{key}"),
                None => key.to_string(),
            };
            let binding = FieldBinding::named(template, label);

            let forwarding = [FieldEvent::Change, FieldEvent::Blur].map(|event| {
                let parent = self.parent.downgrade();
                binding.add_event_listener(event, move |event| {
                    if let Some(parent) = parent.upgrade() {
                        parent.dispatch_event(event);
                    }
                })
            });

            entries.push(Child {
                key: key.to_string(),
                binding: binding.clone(),
                forwarding,
            });
            binding
        };

        if self.parent.state() == BindingState::Unavailable {
            child.destroy();
        }
        child
    }

    /// Keys looked up so far, in lookup order.
    pub fn keys(&self) -> Vec<String> {
        self.children.entries.lock().iter().map(|c| c.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.children.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.entries.lock().is_empty()
    }

    pub fn parent(&self) -> &FieldBinding<R> {
        &self.parent
    }
}

impl<R: Record> fmt::Debug for ObjectFields<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectFields")
            .field("parent", &self.parent.label())
            .field("keys", &self.keys())
            .finish()
    }
}

impl<R: Record> FieldBinding<R> {
    /// Per-key children of this binding. Repeated calls share the same
    /// children; see [`ObjectFields`].
    pub fn object(&self) -> ObjectFields<R> {
        ObjectFields::new(self)
    }
}

// ---------------------------------------------------------------------------
// ObjectSurface
// ---------------------------------------------------------------------------

/// The surface an object composition attaches to its parent.
struct ObjectSurface<R: Record> {
    children: Arc<Children<R::Field>>,
    label: String,
}

impl<R: Record> ObjectSurface<R> {
    /// Await `work`, warning once if it outlives the configured attach delay.
    async fn watch<O>(
        &self,
        op: &str,
        targets: &[(String, FieldBinding<R::Field>)],
        work: impl Future<Output = O>,
    ) -> O {
        let Some(after) = config().attach_warning() else {
            return work.await;
        };
        if Handle::try_current().is_err() {
            return work.await;
        }

        tokio::pin!(work);
        let first = tokio::time::timeout(after, &mut work).await;
        match first {
            Ok(out) => out,
            Err(_) => {
                let waiting: Vec<&str> = targets
                    .iter()
                    .filter(|(_, b)| b.state() == BindingState::Unready)
                    .map(|(key, _)| key.as_str())
                    .collect();
                log::warn!(
                    "[ObjectFields] '{}' {} still waiting after {:?} on unattached fields: [{}]",
                    self.label,
                    op,
                    after,
                    waiting.join(", ")
                );
                work.await
            }
        }
    }

    fn report_unavailable(&self, op: &str, keys: &[String]) {
        if config().log_unavailable {
            log::error!(
                "[ObjectFields] '{}' {}: fields unavailable: [{}]",
                self.label,
                op,
                keys.join(", ")
            );
        }
    }
}

#[async_trait]
impl<R: Record> Surface<R> for ObjectSurface<R> {
    async fn get(&self, stage: Stage) -> GetResult<R> {
        let targets = self.children.snapshot();
        let reads = join_all(targets.iter().map(|(_, child)| child.get_at(stage)));
        let results = self.watch("get", &targets, reads).await;

        let mut fields = Vec::with_capacity(results.len());
        let mut unavailable = Vec::new();
        let mut faulted = false;
        for ((key, _), result) in targets.into_iter().zip(results) {
            match result {
                GetResult::Success { value } => fields.push((key, value)),
                GetResult::ValidationFault => faulted = true,
                GetResult::Unavailable => unavailable.push(key),
            }
        }

        if !unavailable.is_empty() {
            self.report_unavailable("get", &unavailable);
            GetResult::Unavailable
        } else if faulted {
            GetResult::ValidationFault
        } else {
            GetResult::success(R::from_fields(fields))
        }
    }

    async fn set(&self, value: R) -> SetResult {
        let mut targets = Vec::new();
        let mut writes = Vec::new();
        for (key, child) in self.children.snapshot() {
            if let Some(field) = value.field(&key) {
                writes.push(child.set(field));
                targets.push((key, child));
            }
        }

        let results = self.watch("set", &targets, join_all(writes)).await;
        let unavailable: Vec<String> = targets
            .into_iter()
            .zip(results)
            .filter(|(_, result)| !result.is_success())
            .map(|((key, _), _)| key)
            .collect();

        if unavailable.is_empty() {
            SetResult::Success
        } else {
            self.report_unavailable("set", &unavailable);
            SetResult::Unavailable
        }
    }

    async fn set_template(&self, template: Template<R>, execute_set: bool) -> Option<SetResult> {
        let children = self.children.snapshot();
        let result = match template {
            Template::Pending => {
                for (_, child) in &children {
                    child.mark_template_pending();
                }
                SetResult::Success
            }
            Template::Absent => {
                for (_, child) in &children {
                    child.clear_template();
                }
                SetResult::Success
            }
            Template::Resolved(record) => {
                let mut targets = Vec::new();
                let mut writes = Vec::new();
                for (key, child) in children {
                    if let Some(field) = record.field(&key) {
                        writes.push(child.set_template(field, execute_set));
                        targets.push(key);
                    }
                }
                let unavailable: Vec<String> = targets
                    .into_iter()
                    .zip(join_all(writes).await)
                    .filter(|(_, result)| !result.is_success())
                    .map(|(key, _)| key)
                    .collect();
                if unavailable.is_empty() {
                    SetResult::Success
                } else {
                    self.report_unavailable("set_template", &unavailable);
                    SetResult::Unavailable
                }
            }
        };
        Some(result)
    }
}
