//! Template state: the value a binding defaults or resets to.

use serde::{Deserialize, Serialize};

/// What a binding should hold before the user has touched it.
///
/// The template is independent of the live value held by the surface. It
/// hydrates a surface the first time one attaches and tells consumers
/// whether an asynchronous initial value is still being loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Template<T> {
    /// No template.
    Absent,
    /// An initial value is being loaded.
    Pending,
    /// The initial value is known.
    Resolved(T),
}

impl<T> Default for Template<T> {
    fn default() -> Self {
        Template::Absent
    }
}

impl<T> Template<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Template::Absent)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Template::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Template::Resolved(_))
    }

    /// Borrow the resolved value, if any.
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Template::Resolved(v) => Some(v),
            _ => None,
        }
    }

    /// Take the resolved value, if any.
    pub fn into_resolved(self) -> Option<T> {
        match self {
            Template::Resolved(v) => Some(v),
            _ => None,
        }
    }

    /// Derive a template of another type, keeping absent/pending as they are.
    ///
    /// `f` returning `None` yields `Absent`.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Option<U>) -> Template<U> {
        match self {
            Template::Absent => Template::Absent,
            Template::Pending => Template::Pending,
            Template::Resolved(v) => match f(v) {
                Some(u) => Template::Resolved(u),
                None => Template::Absent,
            },
        }
    }
}

impl<T> From<Option<T>> for Template<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Template::Resolved(v),
            None => Template::Absent,
        }
    }
}
