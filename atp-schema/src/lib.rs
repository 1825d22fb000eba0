//! ATP Schema Engine
//!
//! Plugin-declared types as a graph of named object definitions.
//!
//! # Overview
//!
//! - [`ScopeSchema`] - a root object plus the objects it can reference
//! - [`ObjectSchema`] - a named record of [`PropertySchema`]s
//! - [`RefSchema`] - a lazy pointer to an object of the enclosing scope
//! - [`CompatibilityChecker`] - structural comparison between schemas
//! - [`Schema`] - the steps a plugin declares
//!
//! Every node implements [`Type`]. Values are carried as [`Value`]; use
//! [`TypedScopeSchema`] to work with native Rust types.

mod compat;
mod error;
mod leaf;
mod object;
mod reference;
mod scope;
mod step;
mod typed;
mod types;

pub use compat::CompatibilityChecker;
pub use error::{BoxError, Result, SchemaError};
pub use leaf::{AnySchema, BoolSchema, FloatSchema, IntSchema, ListSchema, MapSchema, StringSchema};
pub use object::{DisplayValue, ObjectSchema, PropertySchema};
pub use reference::RefSchema;
pub use scope::ScopeSchema;
pub use step::{Schema, SignalSchema, StepOutputSchema, StepSchema};
pub use typed::{NativeType, TypedScopeSchema};
pub use types::{Compatible, Mixed, Type, TypeId, TypeSchema};

pub use serde_json::Value;
