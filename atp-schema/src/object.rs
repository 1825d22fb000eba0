//! Object and property schemas

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compat::CompatibilityChecker;
use crate::error::{Result, SchemaError};
use crate::reference::RefSchema;
use crate::typed::NativeType;
use crate::types::{describe, Compatible, Mixed, Type, TypeId, TypeSchema};

/// Human-readable metadata for a property, step or output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl DisplayValue {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A property of an object: its type plus presence rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema: TypeSchema,
    #[serde(default)]
    pub required: bool,
    /// Value used when the property is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayValue>,
    /// Required when any of these sibling properties is set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_if: Vec<String>,
    /// Required when none of these sibling properties is set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_if_not: Vec<String>,
    /// Must not be set together with any of these sibling properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

impl PropertySchema {
    /// Optional property
    pub fn new(schema: impl Into<TypeSchema>) -> Self {
        Self {
            schema: schema.into(),
            required: false,
            default: None,
            display: None,
            required_if: Vec::new(),
            required_if_not: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Required property
    pub fn required(schema: impl Into<TypeSchema>) -> Self {
        Self {
            required: true,
            ..Self::new(schema)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_display(mut self, display: DisplayValue) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_required_if<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_if = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_if_not<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_if_not = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_conflicts<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflicts = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Check the presence rules of this property against its siblings
    fn check_presence(&self, name: &str, data: &Map<String, Value>) -> Result<()> {
        let is_set = |key: &str| data.get(key).is_some_and(|value| !value.is_null());

        if is_set(name) {
            if let Some(conflict) = self.conflicts.iter().find(|other| is_set(other)) {
                return Err(SchemaError::constraint(format!(
                    "Field conflicts with '{conflict}', set one of the two, not both"
                )));
            }
            return Ok(());
        }

        if self.default.is_some() {
            return Ok(());
        }
        if self.required {
            return Err(SchemaError::constraint("This field is required"));
        }
        if let Some(trigger) = self.required_if.iter().find(|other| is_set(other)) {
            return Err(SchemaError::constraint(format!(
                "This field is required because '{trigger}' is set"
            )));
        }
        if !self.required_if_not.is_empty() && !self.required_if_not.iter().any(|other| is_set(other)) {
            return Err(SchemaError::constraint(format!(
                "This field is required because none of '{}' are set",
                self.required_if_not.join("', '")
            )));
        }
        Ok(())
    }
}

/// How absent properties with a default are treated while walking an object
#[derive(Clone, Copy, PartialEq, Eq)]
enum Defaults {
    Fill,
    Skip,
}

/// A named record of properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSchema {
    id: String,
    #[serde(default)]
    properties: BTreeMap<String, PropertySchema>,
    #[serde(skip)]
    native_type: Option<NativeType>,
}

impl PartialEq for ObjectSchema {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.properties == other.properties
    }
}

impl ObjectSchema {
    pub fn new<I, K>(id: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertySchema)>,
        K: Into<String>,
    {
        Self {
            id: id.into(),
            properties: properties
                .into_iter()
                .map(|(name, property)| (name.into(), property))
                .collect(),
            native_type: None,
        }
    }

    /// Object mapped to the native type `T`, for use as the root of a
    /// [`TypedScopeSchema`](crate::TypedScopeSchema)
    pub fn new_typed<T: 'static, I, K>(id: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertySchema)>,
        K: Into<String>,
    {
        Self {
            native_type: Some(NativeType::of::<T>()),
            ..Self::new(id, properties)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertySchema> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    pub fn native_type(&self) -> Option<NativeType> {
        self.native_type
    }

    /// Defaults of every property that declares one
    pub fn defaults(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .filter_map(|(name, property)| {
                property
                    .default
                    .as_ref()
                    .map(|default| (name.clone(), default.clone()))
            })
            .collect()
    }

    pub(crate) fn visit_refs(&self, visitor: &mut dyn FnMut(&RefSchema)) {
        for property in self.properties.values() {
            property.schema.visit_refs(visitor);
        }
    }

    fn as_map<'a>(&self, data: &'a Value) -> Result<&'a Map<String, Value>> {
        data.as_object().ok_or_else(|| {
            SchemaError::constraint(format!(
                "Must be a map for object '{}', {} given",
                self.id,
                describe(data)
            ))
        })
    }

    fn check_unknown(&self, data: &Map<String, Value>) -> Result<()> {
        match data.keys().find(|key| !self.properties.contains_key(*key)) {
            Some(key) => Err(SchemaError::constraint(format!(
                "Invalid parameter '{key}', expected one of: {}",
                self.properties
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
            .at(key.clone())),
            None => Ok(()),
        }
    }

    /// Walk the declared properties, transforming each present value with `op`
    fn walk(
        &self,
        data: &Value,
        defaults: Defaults,
        op: impl Fn(&TypeSchema, &Value) -> Result<Value>,
    ) -> Result<Map<String, Value>> {
        let data = self.as_map(data)?;
        self.check_unknown(data)?;

        let mut result = Map::new();
        for (name, property) in &self.properties {
            property
                .check_presence(name, data)
                .map_err(|e| e.at(name.clone()))?;

            match data.get(name).filter(|value| !value.is_null()) {
                Some(value) => {
                    let value = op(&property.schema, value).map_err(|e| e.at(name.clone()))?;
                    result.insert(name.clone(), value);
                }
                None => {
                    if let (Defaults::Fill, Some(default)) = (defaults, &property.default) {
                        let value = property
                            .schema
                            .unserialize(default)
                            .map_err(|e| e.at(name.clone()))?;
                        result.insert(name.clone(), value);
                    }
                }
            }
        }
        Ok(result)
    }

    /// Check presence rules on data whose values may be schemas, then run
    /// `op` on each present property
    pub(crate) fn walk_mixed(
        &self,
        entries: &BTreeMap<String, Mixed>,
        mut op: impl FnMut(&TypeSchema, &Mixed) -> Result<()>,
    ) -> Result<()> {
        let presence: Map<String, Value> = entries
            .iter()
            .map(|(key, value)| {
                let marker = if value.is_null() { Value::Null } else { Value::Bool(true) };
                (key.clone(), marker)
            })
            .collect();
        self.check_unknown(&presence)?;

        for (name, property) in &self.properties {
            property
                .check_presence(name, &presence)
                .map_err(|e| e.at(name.clone()))?;
            if let Some(value) = entries.get(name).filter(|value| !value.is_null()) {
                op(&property.schema, value).map_err(|e| e.at(name.clone()))?;
            }
        }
        Ok(())
    }
}

impl Type for ObjectSchema {
    fn type_id(&self) -> TypeId {
        TypeId::Object
    }

    fn validate(&self, data: &Value) -> Result<()> {
        self.walk(data, Defaults::Skip, |schema, value| {
            schema.validate(value).map(|()| Value::Null)
        })
        .map(|_| ())
    }

    fn serialize(&self, data: &Value) -> Result<Value> {
        self.walk(data, Defaults::Fill, |schema, value| Type::serialize(schema, value))
            .map(Value::Object)
    }

    fn unserialize(&self, data: &Value) -> Result<Value> {
        self.walk(data, Defaults::Fill, |schema, value| schema.unserialize(value))
            .map(Value::Object)
    }

    fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()> {
        match other {
            Compatible::Data(data) => self.validate(data),
            Compatible::Schema(schema) => CompatibilityChecker::new().check_object(self, schema),
            Compatible::Mixed(mixed) => CompatibilityChecker::new().check_mixed_object(self, mixed),
        }
    }
}
