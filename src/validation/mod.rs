//! Staged validation.
//!
//! Validators receive the value and a [`Failures`] collector. A failure is
//! recorded with a threshold [`Stage`](crate::binding::Stage) and only
//! counts once the evaluated stage reaches it, so "required" can wait for
//! blur while "too long" shows on every keystroke.

pub mod pipeline;
pub mod validator;

pub use pipeline::{Failures, ValidatorId};
pub(crate) use pipeline::ValidatorRegistry;
pub use validator::Validation;
