//! The root of a form: one binding for the whole submitted value.

use std::ops::Deref;

use futures::future::BoxFuture;

use crate::binding::{FieldBinding, FieldValue, GetResult, SetResult, Template};

/// Owns the root binding of a form.
///
/// Compose the root with [`FieldBinding::object`] or
/// [`FieldBinding::transform`] and hand the resulting bindings to inputs.
#[derive(Debug, Clone)]
pub struct Form<T: FieldValue> {
    root: FieldBinding<T>,
}

impl<T: FieldValue> Form<T> {
    /// A form whose initial value is `value`.
    pub fn new(value: T) -> Self {
        Self::from_template(Template::Resolved(value))
    }

    pub fn from_template(template: Template<T>) -> Self {
        Self {
            root: FieldBinding::named(template, "form"),
        }
    }

    /// A form whose initial value is still loading. See [`load`](Self::load).
    pub fn pending() -> Self {
        Self::from_template(Template::Pending)
    }

    pub fn absent() -> Self {
        Self::from_template(Template::Absent)
    }

    pub fn binding(&self) -> &FieldBinding<T> {
        &self.root
    }

    /// Deliver the initial value of a pending form and write it to the inputs.
    pub fn load(&self, value: T) -> BoxFuture<'static, SetResult> {
        self.root.set_template(value, true)
    }

    /// Read the whole value with submit-stage validation.
    pub fn collect(&self) -> BoxFuture<'static, GetResult<T>> {
        self.root.get(true)
    }
}

impl<T: FieldValue> Deref for Form<T> {
    type Target = FieldBinding<T>;

    fn deref(&self) -> &FieldBinding<T> {
        &self.root
    }
}
