//! Scopes: id-indexed registries of objects that refs resolve against

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compat::CompatibilityChecker;
use crate::error::{Result, SchemaError};
use crate::object::{ObjectSchema, PropertySchema};
use crate::types::{Compatible, Type, TypeId};

/// Object registry shared by a scope and the refs bound to it
#[derive(Debug)]
pub(crate) struct ScopeObjects {
    objects: BTreeMap<String, ObjectSchema>,
    root: String,
}

impl ScopeObjects {
    pub(crate) fn object(&self, id: &str) -> Result<&ObjectSchema> {
        self.objects.get(id).ok_or_else(|| {
            SchemaError::bad_argument(format!(
                "Referenced object '{id}' not found in scope, available: {}",
                self.objects
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}

/// A root object plus the objects it can reference.
///
/// Built once; every ref inside the contained objects is bound to this
/// scope during construction. Nested scopes keep their own binding. Cloning
/// is cheap and shares the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ScopeDefinition", into = "ScopeDefinition")]
pub struct ScopeSchema {
    inner: Arc<ScopeObjects>,
}

/// Wire form of a scope
#[derive(Serialize, Deserialize)]
struct ScopeDefinition {
    objects: BTreeMap<String, ObjectSchema>,
    root: String,
}

impl TryFrom<ScopeDefinition> for ScopeSchema {
    type Error = SchemaError;

    fn try_from(definition: ScopeDefinition) -> Result<Self> {
        ScopeSchema::from_objects(definition.objects, definition.root)
    }
}

impl From<ScopeSchema> for ScopeDefinition {
    fn from(scope: ScopeSchema) -> Self {
        Self {
            objects: scope.inner.objects.clone(),
            root: scope.inner.root.clone(),
        }
    }
}

impl PartialEq for ScopeSchema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.root == other.inner.root && self.inner.objects == other.inner.objects)
    }
}

impl ScopeSchema {
    /// Build a scope from its root object and the objects it references.
    ///
    /// An object in `others` with the root's id is replaced by the root.
    pub fn new(root: ObjectSchema, others: impl IntoIterator<Item = ObjectSchema>) -> Self {
        let root_id = root.id().to_string();
        let mut objects: BTreeMap<String, ObjectSchema> = others
            .into_iter()
            .map(|object| (object.id().to_string(), object))
            .collect();
        objects.insert(root_id.clone(), root);
        Self::bind(objects, root_id)
    }

    /// Build a scope from an id map, checking that the root exists, that
    /// keys match object ids and that every ref has a target.
    pub fn from_objects(objects: BTreeMap<String, ObjectSchema>, root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if !objects.contains_key(&root) {
            return Err(SchemaError::bad_argument(format!(
                "Root object '{root}' not found in scope"
            )));
        }

        for (key, object) in &objects {
            if key != object.id() {
                return Err(SchemaError::bad_argument(format!(
                    "Object registered as '{key}' declares id '{}'",
                    object.id()
                )));
            }

            let mut dangling = None;
            object.visit_refs(&mut |reference| {
                if dangling.is_none() && !objects.contains_key(reference.id()) {
                    dangling = Some(reference.id().to_string());
                }
            });
            if let Some(target) = dangling {
                return Err(SchemaError::bad_argument(format!(
                    "Object '{key}' references '{target}', which is not part of the scope"
                )));
            }
        }

        Ok(Self::bind(objects, root))
    }

    fn bind(objects: BTreeMap<String, ObjectSchema>, root: String) -> Self {
        let inner = Arc::new_cyclic(|scope| {
            for object in objects.values() {
                object.visit_refs(&mut |reference| reference.apply_scope(scope));
            }
            ScopeObjects { objects, root }
        });
        Self { inner }
    }

    /// Id of the root object
    pub fn root(&self) -> &str {
        &self.inner.root
    }

    pub fn objects(&self) -> &BTreeMap<String, ObjectSchema> {
        &self.inner.objects
    }

    pub fn object(&self, id: &str) -> Option<&ObjectSchema> {
        self.inner.objects.get(id)
    }

    pub fn root_object(&self) -> &ObjectSchema {
        &self.inner.objects[&self.inner.root]
    }

    /// Same as the root object id
    pub fn id(&self) -> &str {
        self.root_object().id()
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertySchema> {
        self.root_object().properties()
    }

    pub fn defaults(&self) -> Map<String, Value> {
        self.root_object().defaults()
    }

    /// Serialize the scope definition itself
    pub fn self_serialize(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| SchemaError::bad_argument("Failed to serialize scope").with_cause(e))
    }

    /// Check that `other` can stand in for this scope
    pub fn check_compatible(&self, other: &ScopeSchema) -> Result<()> {
        CompatibilityChecker::new().compare_scopes(self, other)
    }
}

impl Type for ScopeSchema {
    fn type_id(&self) -> TypeId {
        TypeId::Scope
    }

    fn validate(&self, data: &Value) -> Result<()> {
        self.root_object().validate(data)
    }

    fn serialize(&self, data: &Value) -> Result<Value> {
        Type::serialize(self.root_object(), data)
    }

    fn unserialize(&self, data: &Value) -> Result<Value> {
        self.root_object().unserialize(data)
    }

    fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()> {
        match other {
            Compatible::Data(data) => self.validate(data),
            Compatible::Schema(schema) => CompatibilityChecker::new().check_scope(self, schema),
            Compatible::Mixed(mixed) => CompatibilityChecker::new().check_mixed_scope(self, mixed),
        }
    }
}
