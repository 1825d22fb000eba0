//! Typed access to a scope through serde

use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::object::ObjectSchema;
use crate::scope::ScopeSchema;
use crate::types::Type;

/// Native Rust type an object is mapped to
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NativeType {
    id: TypeId,
    name: &'static str,
}

impl NativeType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A scope whose root object is mapped to `T`
pub struct TypedScopeSchema<T> {
    scope: ScopeSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedScopeSchema<T> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedScopeSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedScopeSchema")
            .field("type", &type_name::<T>())
            .field("scope", &self.scope)
            .finish()
    }
}

impl<T> TypedScopeSchema<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Fails with `BadArgument` unless `root` was built with
    /// [`ObjectSchema::new_typed::<T>`](ObjectSchema::new_typed)
    pub fn new(root: ObjectSchema, others: impl IntoIterator<Item = ObjectSchema>) -> Result<Self> {
        let expected = NativeType::of::<T>();
        if root.native_type() != Some(expected) {
            return Err(SchemaError::bad_argument(format!(
                "Incorrect type definition: type {} does not match the root object type of {}",
                expected.name(),
                root.native_type()
                    .map_or("an unmapped object", |native| native.name())
            )));
        }

        Ok(Self {
            scope: ScopeSchema::new(root, others),
            _marker: PhantomData,
        })
    }

    pub fn scope(&self) -> &ScopeSchema {
        &self.scope
    }

    pub fn unserialize_type(&self, data: &Value) -> Result<T> {
        let value = self.scope.unserialize(data)?;
        serde_json::from_value(value).map_err(|e| {
            SchemaError::constraint(format!("Cannot convert to {}", type_name::<T>())).with_cause(e)
        })
    }

    pub fn validate_type(&self, data: &T) -> Result<()> {
        self.scope.validate(&to_value(data)?)
    }

    pub fn serialize_type(&self, data: &T) -> Result<Value> {
        Type::serialize(&self.scope, &to_value(data)?)
    }
}

impl<T> Deref for TypedScopeSchema<T> {
    type Target = ScopeSchema;

    fn deref(&self) -> &ScopeSchema {
        &self.scope
    }
}

fn to_value<T: Serialize>(data: &T) -> Result<Value> {
    serde_json::to_value(data).map_err(|e| {
        SchemaError::constraint(format!("Cannot convert from {}", type_name::<T>())).with_cause(e)
    })
}
