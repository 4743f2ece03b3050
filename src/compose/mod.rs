//! Bindings built out of other bindings.
//!
//! - [`ObjectFields`] backs a record binding with one child per key.
//! - [`transform`] presents a binding through a pair of conversions.
//!
//! Both act as the surface of the binding they back and as the controller
//! of the bindings they create.

pub mod object;
pub mod record;
pub mod transform;

pub use object::ObjectFields;
pub use record::Record;
pub use transform::{transform, ConvertFn, Transform};
