//! The type contract and the schema node enum

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::leaf::{AnySchema, BoolSchema, FloatSchema, IntSchema, ListSchema, MapSchema, StringSchema};
use crate::object::ObjectSchema;
use crate::reference::RefSchema;
use crate::scope::ScopeSchema;

/// Identifier of a schema node kind, as written in the `type_id` field on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeId {
    String,
    Integer,
    Float,
    Bool,
    Any,
    List,
    Map,
    Object,
    Ref,
    Scope,
}

impl TypeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeId::String => "string",
            TypeId::Integer => "integer",
            TypeId::Float => "float",
            TypeId::Bool => "bool",
            TypeId::Any => "any",
            TypeId::List => "list",
            TypeId::Map => "map",
            TypeId::Object => "object",
            TypeId::Ref => "ref",
            TypeId::Scope => "scope",
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument of a compatibility check: a concrete value, another schema, or
/// data with schemas in place of some of its values
#[derive(Debug, Clone, Copy)]
pub enum Compatible<'a> {
    Data(&'a Value),
    Schema(&'a TypeSchema),
    Mixed(&'a Mixed),
}

/// Data in which any value may be replaced by the schema it will have
#[derive(Debug, Clone, PartialEq)]
pub enum Mixed {
    Data(Value),
    Schema(TypeSchema),
    List(Vec<Mixed>),
    Map(BTreeMap<String, Mixed>),
}

impl Mixed {
    pub fn list(items: impl IntoIterator<Item = Mixed>) -> Self {
        Mixed::List(items.into_iter().collect())
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Mixed)>,
        K: Into<String>,
    {
        Mixed::Map(entries.into_iter().map(|(key, value)| (key.into(), value)).collect())
    }

    /// Whether this stands for an absent value
    pub(crate) fn is_null(&self) -> bool {
        matches!(self, Mixed::Data(Value::Null))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Mixed::Data(data) => describe(data),
            Mixed::Schema(schema) => schema.type_id().as_str(),
            Mixed::List(_) => "list",
            Mixed::Map(_) => "map",
        }
    }
}

impl From<Value> for Mixed {
    fn from(value: Value) -> Self {
        Mixed::Data(value)
    }
}

impl From<TypeSchema> for Mixed {
    fn from(schema: TypeSchema) -> Self {
        Mixed::Schema(schema)
    }
}

impl<'a> From<&'a Mixed> for Compatible<'a> {
    fn from(mixed: &'a Mixed) -> Self {
        Compatible::Mixed(mixed)
    }
}

impl<'a> From<&'a Value> for Compatible<'a> {
    fn from(value: &'a Value) -> Self {
        Compatible::Data(value)
    }
}

impl<'a> From<&'a TypeSchema> for Compatible<'a> {
    fn from(schema: &'a TypeSchema) -> Self {
        Compatible::Schema(schema)
    }
}

/// Contract every schema node implements.
///
/// `unserialize` turns wire data into the engine's value form, `serialize`
/// does the reverse, `validate` checks a value without transforming it.
pub trait Type: fmt::Debug + Send + Sync {
    fn type_id(&self) -> TypeId;

    fn validate(&self, data: &Value) -> Result<()>;

    fn serialize(&self, data: &Value) -> Result<Value>;

    fn unserialize(&self, data: &Value) -> Result<Value>;

    /// Check that `other` can stand in for this schema.
    ///
    /// Data arguments behave exactly like [`Type::validate`]. Mixed
    /// arguments are validated as data and compared as schemas where they
    /// carry one.
    fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()>;
}

/// A schema node as it appears in a property, list item or map entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_id", rename_all = "snake_case")]
pub enum TypeSchema {
    String(StringSchema),
    Integer(IntSchema),
    Float(FloatSchema),
    Bool(BoolSchema),
    Any(AnySchema),
    List(ListSchema),
    Map(MapSchema),
    Object(ObjectSchema),
    Ref(RefSchema),
    Scope(ScopeSchema),
}

impl TypeSchema {
    pub fn string() -> Self {
        TypeSchema::String(StringSchema::default())
    }

    pub fn integer() -> Self {
        TypeSchema::Integer(IntSchema::default())
    }

    pub fn float() -> Self {
        TypeSchema::Float(FloatSchema::default())
    }

    pub fn bool() -> Self {
        TypeSchema::Bool(BoolSchema::default())
    }

    pub fn any() -> Self {
        TypeSchema::Any(AnySchema::default())
    }

    pub fn list(items: impl Into<TypeSchema>) -> Self {
        TypeSchema::List(ListSchema::new(items))
    }

    pub fn map(keys: impl Into<TypeSchema>, values: impl Into<TypeSchema>) -> Self {
        TypeSchema::Map(MapSchema::new(keys, values))
    }

    /// Reference to an object of the enclosing scope
    pub fn reference(id: impl Into<String>) -> Self {
        TypeSchema::Ref(RefSchema::new(id))
    }

    fn as_type(&self) -> &dyn Type {
        match self {
            TypeSchema::String(s) => s,
            TypeSchema::Integer(s) => s,
            TypeSchema::Float(s) => s,
            TypeSchema::Bool(s) => s,
            TypeSchema::Any(s) => s,
            TypeSchema::List(s) => s,
            TypeSchema::Map(s) => s,
            TypeSchema::Object(s) => s,
            TypeSchema::Ref(s) => s,
            TypeSchema::Scope(s) => s,
        }
    }

    /// Visit every ref below this node without entering nested scopes
    pub(crate) fn visit_refs(&self, visitor: &mut dyn FnMut(&RefSchema)) {
        match self {
            TypeSchema::List(list) => list.items().visit_refs(visitor),
            TypeSchema::Map(map) => {
                map.keys().visit_refs(visitor);
                map.values().visit_refs(visitor);
            }
            TypeSchema::Object(object) => object.visit_refs(visitor),
            TypeSchema::Ref(reference) => visitor(reference),
            _ => {}
        }
    }
}

impl Type for TypeSchema {
    fn type_id(&self) -> TypeId {
        self.as_type().type_id()
    }

    fn validate(&self, data: &Value) -> Result<()> {
        self.as_type().validate(data)
    }

    fn serialize(&self, data: &Value) -> Result<Value> {
        Type::serialize(self.as_type(), data)
    }

    fn unserialize(&self, data: &Value) -> Result<Value> {
        self.as_type().unserialize(data)
    }

    fn validate_compatibility(&self, other: Compatible<'_>) -> Result<()> {
        self.as_type().validate_compatibility(other)
    }
}

macro_rules! impl_from_schema {
    ($($variant:ident($schema:ty)),* $(,)?) => {
        $(
            impl From<$schema> for TypeSchema {
                fn from(schema: $schema) -> Self {
                    TypeSchema::$variant(schema)
                }
            }
        )*
    };
}

impl_from_schema!(
    String(StringSchema),
    Integer(IntSchema),
    Float(FloatSchema),
    Bool(BoolSchema),
    Any(AnySchema),
    List(ListSchema),
    Map(MapSchema),
    Object(ObjectSchema),
    Ref(RefSchema),
    Scope(ScopeSchema),
);

/// Short description of the kind of a value, for error messages
pub(crate) fn describe(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
