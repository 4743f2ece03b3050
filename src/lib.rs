//! # formbind
//!
//! A field-binding synchronization engine. A controller and the input
//! widget ("surface") holding a field's live value become available at
//! different times; a [`FieldBinding`] lets either side go first.
//!
//! - [`binding`]: the unready/ready/unavailable state machine and the
//!   surface contract.
//! - [`validation`]: staged validators and failure lists.
//! - [`compose`]: record bindings split into per-key children, and value
//!   transforms between binding types.
//! - [`pending`]: tracking asynchronously loaded initial values.
//! - [`form`] and [`inputs`]: a form root and an in-memory surface.
//!
//! ```no_run
//! use formbind::{Form, MemoryInput};
//! use serde_json::json;
//!
//! # async fn run() {
//! let form = Form::new(json!({"name": "Ada"}));
//! let fields = form.object();
//! let name = fields.field("name");
//! fields.attach();
//!
//! let input = MemoryInput::new(json!(null));
//! input.mount(&name).await;
//! input.input(json!("Grace"));
//!
//! let submitted = form.collect().await;
//! # }
//! ```

pub mod binding;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod form;
pub mod inputs;
pub mod pending;
pub mod validation;

pub use binding::{
    BindingState, FieldBinding, FieldValue, FnSurface, GetResult, SetResult, Stage, Surface,
    Template, WeakBinding,
};
pub use compose::{transform, ObjectFields, Record, Transform};
pub use config::{config, set_config, Config};
pub use error::{BindingError, Direction, Result};
pub use events::{EventBus, FieldEvent, ListenerId};
pub use form::Form;
pub use inputs::MemoryInput;
pub use pending::PendingWatch;
pub use validation::{Failures, Validation, ValidatorId};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
