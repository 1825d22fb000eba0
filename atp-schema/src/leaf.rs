//! Leaf types: primitives and containers.
//!
//! These only check the kind of a value. Constraints such as ranges or
//! patterns are not part of this crate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compat::CompatibilityChecker;
use crate::error::{Result, SchemaError};
use crate::types::{describe, Compatible, Type, TypeId, TypeSchema};

macro_rules! scalar_schema {
    ($(#[$meta:meta])* $name:ident, $type_id:expr, $expected:literal, $check:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {}

        impl $name {
            pub fn new() -> Self {
                Self {}
            }
        }

        impl Type for $name {
            fn type_id(&self) -> TypeId {
                $type_id
            }

            fn validate(&self, data: &Value) -> Result<()> {
                let check: fn(&Value) -> bool = $check;
                if check(data) {
                    Ok(())
                } else {
                    Err(SchemaError::constraint(format!(
                        "Must be {}, {} given",
                        $expected,
                        describe(data)
                    )))
                }
            }

            fn serialize(&self, data: &Value) -> Result<Value> {
                self.validate(data)?;
                Ok(data.clone())
            }

            fn unserialize(&self, data: &Value) -> Result<Value> {
                self.validate(data)?;
                Ok(data.clone())
            }

            fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()> {
                match other {
                    Compatible::Data(data) => self.validate(data),
                    Compatible::Schema(schema) => CompatibilityChecker::new().check_kind($type_id, schema),
                    Compatible::Mixed(mixed) => CompatibilityChecker::new().check_mixed_leaf(self, mixed),
                }
            }
        }
    };
}

scalar_schema!(
    /// UTF-8 string
    StringSchema,
    TypeId::String,
    "a string",
    |data| data.is_string()
);

scalar_schema!(
    /// 64-bit signed integer
    IntSchema,
    TypeId::Integer,
    "an integer",
    |data| data.as_i64().is_some()
);

scalar_schema!(
    /// Any number, integers included
    FloatSchema,
    TypeId::Float,
    "a number",
    |data| data.is_number()
);

scalar_schema!(BoolSchema, TypeId::Bool, "a boolean", |data| data.is_boolean());

scalar_schema!(
    /// Accepts any value except null
    AnySchema,
    TypeId::Any,
    "a value",
    |data| !data.is_null()
);

/// Homogeneous list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSchema {
    items: Box<TypeSchema>,
}

impl ListSchema {
    pub fn new(items: impl Into<TypeSchema>) -> Self {
        Self {
            items: Box::new(items.into()),
        }
    }

    pub fn items(&self) -> &TypeSchema {
        &self.items
    }

    fn as_list<'a>(&self, data: &'a Value) -> Result<&'a Vec<Value>> {
        data.as_array().ok_or_else(|| {
            SchemaError::constraint(format!("Must be a list, {} given", describe(data)))
        })
    }

    fn map_items(
        &self,
        data: &Value,
        op: impl Fn(&TypeSchema, &Value) -> Result<Value>,
    ) -> Result<Value> {
        self.as_list(data)?
            .iter()
            .enumerate()
            .map(|(index, item)| op(&self.items, item).map_err(|e| e.at(index.to_string())))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }
}

impl Type for ListSchema {
    fn type_id(&self) -> TypeId {
        TypeId::List
    }

    fn validate(&self, data: &Value) -> Result<()> {
        for (index, item) in self.as_list(data)?.iter().enumerate() {
            self.items
                .validate(item)
                .map_err(|e| e.at(index.to_string()))?;
        }
        Ok(())
    }

    fn serialize(&self, data: &Value) -> Result<Value> {
        self.map_items(data, |items, item| Type::serialize(items, item))
    }

    fn unserialize(&self, data: &Value) -> Result<Value> {
        self.map_items(data, |items, item| items.unserialize(item))
    }

    fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()> {
        match other {
            Compatible::Data(data) => self.validate(data),
            Compatible::Schema(schema) => CompatibilityChecker::new().check_list(self, schema),
            Compatible::Mixed(mixed) => CompatibilityChecker::new().check_mixed_list(self, mixed),
        }
    }
}

/// String-keyed map. Keys are carried as strings and checked against the key schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSchema {
    keys: Box<TypeSchema>,
    values: Box<TypeSchema>,
}

impl MapSchema {
    pub fn new(keys: impl Into<TypeSchema>, values: impl Into<TypeSchema>) -> Self {
        Self {
            keys: Box::new(keys.into()),
            values: Box::new(values.into()),
        }
    }

    pub fn keys(&self) -> &TypeSchema {
        &self.keys
    }

    pub fn values(&self) -> &TypeSchema {
        &self.values
    }

    fn as_map<'a>(&self, data: &'a Value) -> Result<&'a Map<String, Value>> {
        data.as_object().ok_or_else(|| {
            SchemaError::constraint(format!("Must be a map, {} given", describe(data)))
        })
    }

    fn map_entries(
        &self,
        data: &Value,
        op: impl Fn(&TypeSchema, &Value) -> Result<Value>,
    ) -> Result<Value> {
        let mut result = Map::new();
        for (key, value) in self.as_map(data)? {
            let key = match op(&self.keys, &Value::String(key.clone())).map_err(|e| e.at(key.clone()))? {
                Value::String(key) => key,
                other => other.to_string(),
            };
            let value = op(&self.values, value).map_err(|e| e.at(key.clone()))?;
            result.insert(key, value);
        }
        Ok(Value::Object(result))
    }
}

impl Type for MapSchema {
    fn type_id(&self) -> TypeId {
        TypeId::Map
    }

    fn validate(&self, data: &Value) -> Result<()> {
        for (key, value) in self.as_map(data)? {
            self.keys
                .validate(&Value::String(key.clone()))
                .map_err(|e| e.at(key.clone()))?;
            self.values.validate(value).map_err(|e| e.at(key.clone()))?;
        }
        Ok(())
    }

    fn serialize(&self, data: &Value) -> Result<Value> {
        self.map_entries(data, |schema, value| Type::serialize(schema, value))
    }

    fn unserialize(&self, data: &Value) -> Result<Value> {
        self.map_entries(data, |schema, value| schema.unserialize(value))
    }

    fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()> {
        match other {
            Compatible::Data(data) => self.validate(data),
            Compatible::Schema(schema) => CompatibilityChecker::new().check_map(self, schema),
            Compatible::Mixed(mixed) => CompatibilityChecker::new().check_mixed_map(self, mixed),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalars_check_kind_only() {
        assert!(StringSchema::new().validate(&json!("hi")).is_ok());
        assert!(StringSchema::new().validate(&json!(1)).is_err());
        assert!(IntSchema::new().validate(&json!(-4)).is_ok());
        assert!(IntSchema::new().validate(&json!(1.5)).is_err());
        assert!(IntSchema::new().validate(&json!("1")).is_err());
        assert!(FloatSchema::new().validate(&json!(1)).is_ok());
        assert!(FloatSchema::new().validate(&json!(1.5)).is_ok());
        assert!(BoolSchema::new().validate(&json!(false)).is_ok());
        assert!(BoolSchema::new().validate(&json!("yes")).is_err());
        assert!(AnySchema::new().validate(&json!({"x": [1]})).is_ok());
        assert!(AnySchema::new().validate(&Value::Null).is_err());
    }

    #[test]
    fn list_error_points_at_index() {
        let list = ListSchema::new(TypeSchema::integer());
        let err = list.unserialize(&json!([1, 2, "three"])).unwrap_err();
        assert!(err.is_constraint());
        assert_eq!(err.path(), ["2".to_string()]);

        assert_eq!(Type::serialize(&list, &json!([1, 2])).unwrap(), json!([1, 2]));
    }

    #[test]
    fn map_checks_keys_and_values() {
        let map = MapSchema::new(TypeSchema::string(), TypeSchema::bool());
        assert_eq!(
            map.unserialize(&json!({"a": true})).unwrap(),
            json!({"a": true})
        );

        let err = map.validate(&json!({"a": true, "b": 1})).unwrap_err();
        assert_eq!(err.path(), ["b".to_string()]);

        let err = MapSchema::new(TypeSchema::integer(), TypeSchema::bool())
            .validate(&json!({"a": true}))
            .unwrap_err();
        assert_eq!(err.path(), ["a".to_string()]);
    }

    #[test]
    fn leaf_compatibility_compares_kinds() {
        let string = StringSchema::new();
        assert!(string
            .validate_compatibility(Compatible::Schema(&TypeSchema::string()))
            .is_ok());
        let err = string
            .validate_compatibility(Compatible::Schema(&TypeSchema::integer()))
            .unwrap_err();
        assert!(err.is_compatibility());

        let list = ListSchema::new(TypeSchema::string());
        assert!(list
            .validate_compatibility(Compatible::Schema(&TypeSchema::list(TypeSchema::integer())))
            .is_err());
        assert!(list
            .validate_compatibility(Compatible::Data(&json!(["a", "b"])))
            .is_ok());
    }
}
