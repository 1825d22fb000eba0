//! References to objects of the enclosing scope

use std::sync::{Arc, OnceLock, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compat::CompatibilityChecker;
use crate::error::{Result, SchemaError};
use crate::object::{DisplayValue, ObjectSchema};
use crate::scope::ScopeObjects;
use crate::types::{Compatible, Type, TypeId};

/// Points at an object by id.
///
/// The binding to the enclosing scope is set once, when the scope is built,
/// and the target is looked up on every use. The binding is weak so a
/// recursive object does not keep its own scope alive. A clone starts out
/// unbound and picks up the scope it is placed in.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefSchema {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display: Option<DisplayValue>,
    #[serde(skip)]
    scope: OnceLock<Weak<ScopeObjects>>,
}

impl Clone for RefSchema {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            display: self.display.clone(),
            scope: OnceLock::new(),
        }
    }
}

impl PartialEq for RefSchema {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.display == other.display
    }
}

impl RefSchema {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display: None,
            scope: OnceLock::new(),
        }
    }

    pub fn with_display(mut self, display: DisplayValue) -> Self {
        self.display = Some(display);
        self
    }

    /// Id of the referenced object
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display(&self) -> Option<&DisplayValue> {
        self.display.as_ref()
    }

    /// Whether a scope has been bound
    pub fn is_bound(&self) -> bool {
        self.scope.get().is_some()
    }

    /// Bind to `scope` unless already bound
    pub(crate) fn apply_scope(&self, scope: &Weak<ScopeObjects>) {
        let _ = self.scope.set(scope.clone());
    }

    /// Scope holding the target; the target is guaranteed to exist in it
    pub(crate) fn resolve(&self) -> Result<Arc<ScopeObjects>> {
        let scope = self
            .scope
            .get()
            .ok_or_else(|| {
                SchemaError::bad_argument(format!(
                    "Reference to '{}' is not bound to a scope",
                    self.id
                ))
            })?
            .upgrade()
            .ok_or_else(|| {
                SchemaError::bad_argument(format!(
                    "Scope of reference to '{}' has been dropped",
                    self.id
                ))
            })?;
        scope.object(&self.id)?;
        Ok(scope)
    }

    /// Run `f` on the referenced object
    pub(crate) fn with_object<T>(&self, f: impl FnOnce(&ObjectSchema) -> Result<T>) -> Result<T> {
        let scope = self.resolve()?;
        f(scope.object(&self.id)?)
    }
}

impl Type for RefSchema {
    fn type_id(&self) -> TypeId {
        TypeId::Ref
    }

    fn validate(&self, data: &Value) -> Result<()> {
        self.with_object(|object| object.validate(data))
    }

    fn serialize(&self, data: &Value) -> Result<Value> {
        self.with_object(|object| Type::serialize(object, data))
    }

    fn unserialize(&self, data: &Value) -> Result<Value> {
        self.with_object(|object| object.unserialize(data))
    }

    fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()> {
        match other {
            Compatible::Data(data) => self.validate(data),
            Compatible::Schema(schema) => CompatibilityChecker::new().check_ref(self, schema),
            Compatible::Mixed(mixed) => CompatibilityChecker::new().check_mixed_ref(self, mixed),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unbound_reference_is_a_bad_argument() {
        let reference = RefSchema::new("Node");
        assert!(!reference.is_bound());
        let err = reference.validate(&json!({})).unwrap_err();
        assert!(err.is_bad_argument());
    }

    #[test]
    fn serialized_form_has_no_binding() {
        let reference = RefSchema::new("Node");
        assert_eq!(serde_json::to_value(&reference).unwrap(), json!({"id": "Node"}));
    }
}
