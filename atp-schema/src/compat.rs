//! Structural compatibility between schemas

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::leaf::{ListSchema, MapSchema};
use crate::object::ObjectSchema;
use crate::reference::RefSchema;
use crate::scope::ScopeSchema;
use crate::types::{Mixed, Type, TypeId, TypeSchema};

/// Compares an expected schema against one that should stand in for it.
///
/// Object ids must match and every property of the expected object must be
/// present on the other side with a compatible type. Leaves compare by kind.
/// A pair of object definitions already under comparison is assumed
/// compatible, which makes recursive schemas terminate. Pairs are tracked by
/// definition, not by id, so a nested scope reusing an outer id is still
/// compared.
#[derive(Debug, Default)]
pub struct CompatibilityChecker {
    in_progress: HashSet<(usize, usize)>,
}

impl CompatibilityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, expected: &TypeSchema, actual: &TypeSchema) -> Result<()> {
        match expected {
            TypeSchema::Any(_) => Ok(()),
            TypeSchema::String(_)
            | TypeSchema::Integer(_)
            | TypeSchema::Float(_)
            | TypeSchema::Bool(_) => self.check_kind(expected.type_id(), actual),
            TypeSchema::List(list) => self.check_list(list, actual),
            TypeSchema::Map(map) => self.check_map(map, actual),
            TypeSchema::Object(object) => self.check_object(object, actual),
            TypeSchema::Ref(reference) => self.check_ref(reference, actual),
            TypeSchema::Scope(scope) => self.check_scope(scope, actual),
        }
    }

    pub fn check_kind(&mut self, expected: TypeId, actual: &TypeSchema) -> Result<()> {
        if expected == TypeId::Any || expected == actual.type_id() {
            Ok(())
        } else {
            Err(mismatch(expected, actual))
        }
    }

    pub fn check_list(&mut self, expected: &ListSchema, actual: &TypeSchema) -> Result<()> {
        match actual {
            TypeSchema::List(list) => self
                .check(expected.items(), list.items())
                .map_err(|e| e.at("items")),
            other => Err(mismatch(TypeId::List, other)),
        }
    }

    pub fn check_map(&mut self, expected: &MapSchema, actual: &TypeSchema) -> Result<()> {
        match actual {
            TypeSchema::Map(map) => {
                self.check(expected.keys(), map.keys())
                    .map_err(|e| e.at("keys"))?;
                self.check(expected.values(), map.values())
                    .map_err(|e| e.at("values"))
            }
            other => Err(mismatch(TypeId::Map, other)),
        }
    }

    /// Objects accept another object, a ref to one or a scope's root object
    pub fn check_object(&mut self, expected: &ObjectSchema, actual: &TypeSchema) -> Result<()> {
        match actual {
            TypeSchema::Object(object) => self.compare_objects(expected, object),
            TypeSchema::Ref(reference) => {
                let scope = reference.resolve()?;
                self.compare_objects(expected, scope.object(reference.id())?)
            }
            TypeSchema::Scope(scope) => self.compare_objects(expected, scope.root_object()),
            other => Err(mismatch(TypeId::Object, other)),
        }
    }

    pub fn check_ref(&mut self, expected: &RefSchema, actual: &TypeSchema) -> Result<()> {
        let scope = expected.resolve()?;
        self.check_object(scope.object(expected.id())?, actual)
    }

    pub fn check_scope(&mut self, expected: &ScopeSchema, actual: &TypeSchema) -> Result<()> {
        match actual {
            TypeSchema::Scope(scope) => self.compare_scopes(expected, scope),
            other => self.check_object(expected.root_object(), other),
        }
    }

    pub fn compare_scopes(&mut self, expected: &ScopeSchema, actual: &ScopeSchema) -> Result<()> {
        if expected.root() != actual.root() {
            return Err(SchemaError::compatibility(format!(
                "scope root mismatch: expected '{}', got '{}'",
                expected.root(),
                actual.root()
            )));
        }
        self.compare_objects(expected.root_object(), actual.root_object())
    }

    pub fn compare_objects(&mut self, expected: &ObjectSchema, actual: &ObjectSchema) -> Result<()> {
        if expected.id() != actual.id() {
            return Err(SchemaError::compatibility(format!(
                "object ID mismatch: expected '{}', got '{}'",
                expected.id(),
                actual.id()
            )));
        }

        let key = (definition(expected), definition(actual));
        if !self.in_progress.insert(key) {
            return Ok(());
        }
        let result = self.compare_properties(expected, actual);
        self.in_progress.remove(&key);
        result
    }

    fn compare_properties(&mut self, expected: &ObjectSchema, actual: &ObjectSchema) -> Result<()> {
        for (name, property) in expected.properties() {
            let other = actual.property(name).ok_or_else(|| {
                SchemaError::compatibility(format!(
                    "property missing from object '{}'",
                    actual.id()
                ))
                .at(name.clone())
            })?;
            self.check(&property.schema, &other.schema)
                .map_err(|e| e.at(name.clone()))?;
        }
        Ok(())
    }

    /// Check data whose values may be schemas: data is validated, schemas are compared
    pub fn check_mixed(&mut self, expected: &TypeSchema, mixed: &Mixed) -> Result<()> {
        match expected {
            TypeSchema::String(_)
            | TypeSchema::Integer(_)
            | TypeSchema::Float(_)
            | TypeSchema::Bool(_)
            | TypeSchema::Any(_) => self.check_mixed_leaf(expected, mixed),
            TypeSchema::List(list) => self.check_mixed_list(list, mixed),
            TypeSchema::Map(map) => self.check_mixed_map(map, mixed),
            TypeSchema::Object(object) => self.check_mixed_object(object, mixed),
            TypeSchema::Ref(reference) => self.check_mixed_ref(reference, mixed),
            TypeSchema::Scope(scope) => self.check_mixed_scope(scope, mixed),
        }
    }

    pub fn check_mixed_leaf(&mut self, expected: &dyn Type, mixed: &Mixed) -> Result<()> {
        match mixed {
            Mixed::Data(data) => expected.validate(data),
            Mixed::Schema(schema) => self.check_kind(expected.type_id(), schema),
            _ if expected.type_id() == TypeId::Any => Ok(()),
            other => Err(mixed_mismatch(expected.type_id(), other)),
        }
    }

    pub fn check_mixed_list(&mut self, expected: &ListSchema, mixed: &Mixed) -> Result<()> {
        match mixed {
            Mixed::Data(data) => expected.validate(data),
            Mixed::Schema(schema) => self.check_list(expected, schema),
            Mixed::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.check_mixed(expected.items(), item)
                        .map_err(|e| e.at(index.to_string()))?;
                }
                Ok(())
            }
            other => Err(mixed_mismatch(TypeId::List, other)),
        }
    }

    pub fn check_mixed_map(&mut self, expected: &MapSchema, mixed: &Mixed) -> Result<()> {
        match mixed {
            Mixed::Data(data) => expected.validate(data),
            Mixed::Schema(schema) => self.check_map(expected, schema),
            Mixed::Map(entries) => {
                for (key, value) in entries {
                    expected
                        .keys()
                        .validate(&Value::String(key.clone()))
                        .map_err(|e| e.at(key.clone()))?;
                    self.check_mixed(expected.values(), value)
                        .map_err(|e| e.at(key.clone()))?;
                }
                Ok(())
            }
            other => Err(mixed_mismatch(TypeId::Map, other)),
        }
    }

    pub fn check_mixed_object(&mut self, expected: &ObjectSchema, mixed: &Mixed) -> Result<()> {
        match mixed {
            Mixed::Data(data) => expected.validate(data),
            Mixed::Schema(schema) => self.check_object(expected, schema),
            Mixed::Map(entries) => {
                expected.walk_mixed(entries, |schema, value| self.check_mixed(schema, value))
            }
            other => Err(mixed_mismatch(TypeId::Object, other)),
        }
    }

    pub fn check_mixed_ref(&mut self, expected: &RefSchema, mixed: &Mixed) -> Result<()> {
        let scope = expected.resolve()?;
        self.check_mixed_object(scope.object(expected.id())?, mixed)
    }

    pub fn check_mixed_scope(&mut self, expected: &ScopeSchema, mixed: &Mixed) -> Result<()> {
        match mixed {
            Mixed::Schema(schema) => self.check_scope(expected, schema),
            other => self.check_mixed_object(expected.root_object(), other),
        }
    }
}

/// Identity of an object definition for the duration of one check
fn definition(object: &ObjectSchema) -> usize {
    object as *const ObjectSchema as usize
}

fn mismatch(expected: TypeId, actual: &TypeSchema) -> SchemaError {
    SchemaError::compatibility(format!(
        "type mismatch: expected {expected}, got {}",
        actual.type_id()
    ))
}

fn mixed_mismatch(expected: TypeId, actual: &Mixed) -> SchemaError {
    SchemaError::compatibility(format!(
        "type mismatch: expected {expected}, got {}",
        actual.kind()
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::object::PropertySchema;
    use crate::types::Compatible;

    fn holder(id: &str, value: TypeSchema) -> ObjectSchema {
        ObjectSchema::new(id, [("value", PropertySchema::required(value))])
    }

    #[test]
    fn any_accepts_everything() {
        let mut checker = CompatibilityChecker::new();
        assert!(checker
            .check(&TypeSchema::any(), &TypeSchema::list(TypeSchema::string()))
            .is_ok());
        assert!(checker
            .check(&TypeSchema::string(), &TypeSchema::any())
            .is_err());
    }

    #[test]
    fn nested_mismatch_carries_path() {
        let expected = TypeSchema::from(holder("H", TypeSchema::map(TypeSchema::string(), TypeSchema::integer())));
        let actual = TypeSchema::from(holder("H", TypeSchema::map(TypeSchema::string(), TypeSchema::float())));

        let err = CompatibilityChecker::new().check(&expected, &actual).unwrap_err();
        assert!(err.is_compatibility());
        assert_eq!(err.path(), ["value".to_string(), "values".to_string()]);
        assert!(err.to_string().contains("expected integer, got float"));
    }

    #[test]
    fn extra_properties_on_the_other_side_are_allowed() {
        let expected = ObjectSchema::new("O", [("a", PropertySchema::required(TypeSchema::string()))]);
        let actual = ObjectSchema::new(
            "O",
            [
                ("a", PropertySchema::required(TypeSchema::string())),
                ("b", PropertySchema::new(TypeSchema::bool())),
            ],
        );

        let mut checker = CompatibilityChecker::new();
        assert!(checker.compare_objects(&expected, &actual).is_ok());
        let err = checker.compare_objects(&actual, &expected).unwrap_err();
        assert_eq!(err.path(), ["b".to_string()]);
    }

    #[test]
    fn recursive_scopes_terminate() {
        let tree = || {
            ScopeSchema::new(
                ObjectSchema::new(
                    "Tree",
                    [(
                        "children",
                        PropertySchema::new(TypeSchema::list(TypeSchema::reference("Tree"))),
                    )],
                ),
                [],
            )
        };
        assert!(tree().check_compatible(&tree()).is_ok());
    }

    #[test]
    fn mixed_lists_and_maps_walk_their_entries() {
        let list = TypeSchema::list(TypeSchema::integer());
        let mut checker = CompatibilityChecker::new();

        let items = Mixed::list([Mixed::from(json!(1)), Mixed::from(TypeSchema::integer())]);
        assert!(checker.check_mixed(&list, &items).is_ok());

        let items = Mixed::list([Mixed::from(json!(1)), Mixed::from(TypeSchema::string())]);
        let err = checker.check_mixed(&list, &items).unwrap_err();
        assert_eq!(err.path(), ["1".to_string()]);

        let map = TypeSchema::map(TypeSchema::string(), TypeSchema::bool());
        let err = checker.check_mixed(&map, &items).unwrap_err();
        assert!(err.to_string().contains("expected map, got list"));

        let entries = Mixed::map([("on", Mixed::from(TypeSchema::bool()))]);
        assert!(checker.check_mixed(&map, &entries).is_ok());
        assert!(checker.check_mixed(&TypeSchema::any(), &entries).is_ok());
    }

    #[test]
    fn nested_scope_reusing_an_outer_id_is_compared() {
        let node = |x: TypeSchema| {
            ScopeSchema::new(
                ObjectSchema::new(
                    "Node",
                    [(
                        "inner",
                        PropertySchema::required(ScopeSchema::new(
                            ObjectSchema::new("Node", [("x", PropertySchema::required(x))]),
                            [],
                        )),
                    )],
                ),
                [],
            )
        };

        let err = node(TypeSchema::string())
            .check_compatible(&node(TypeSchema::integer()))
            .unwrap_err();
        assert!(err.is_compatibility());
        assert_eq!(err.path(), ["inner".to_string(), "x".to_string()]);

        let err = node(TypeSchema::integer())
            .validate_compatibility(Compatible::Schema(&node(TypeSchema::string()).into()))
            .unwrap_err();
        assert_eq!(err.path(), ["inner".to_string(), "x".to_string()]);
        assert!(node(TypeSchema::string()).check_compatible(&node(TypeSchema::string())).is_ok());
    }
}
