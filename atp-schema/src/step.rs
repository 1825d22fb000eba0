//! Plugin schema: the steps a plugin declares in its hello

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::object::DisplayValue;
use crate::scope::ScopeSchema;

/// Every step a plugin offers, by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    steps: BTreeMap<String, StepSchema>,
}

impl Schema {
    pub fn new(steps: impl IntoIterator<Item = StepSchema>) -> Self {
        Self {
            steps: steps
                .into_iter()
                .map(|step| (step.id.clone(), step))
                .collect(),
        }
    }

    pub fn steps(&self) -> &BTreeMap<String, StepSchema> {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Result<&StepSchema> {
        self.steps.get(id).ok_or_else(|| SchemaError::no_such_step(id))
    }

    /// Unserialize a plugin schema, checking every scope it contains
    pub fn from_value(value: Value) -> Result<Self> {
        let schema: Schema = serde_json::from_value(value)
            .map_err(|e| SchemaError::bad_argument("Invalid plugin schema").with_cause(e))?;

        for (key, step) in &schema.steps {
            if key != &step.id {
                return Err(SchemaError::bad_argument(format!(
                    "Step registered as '{key}' declares id '{}'",
                    step.id
                )));
            }
            for (signal_key, signal) in step.signal_handlers.iter().chain(&step.signal_emitters) {
                if signal_key != &signal.id {
                    return Err(SchemaError::bad_argument(format!(
                        "Signal registered as '{signal_key}' on step '{key}' declares id '{}'",
                        signal.id
                    )));
                }
            }
        }
        Ok(schema)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| SchemaError::bad_argument("Failed to serialize plugin schema").with_cause(e))
    }
}

/// One executable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSchema {
    id: String,
    input: ScopeSchema,
    outputs: BTreeMap<String, StepOutputSchema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    signal_handlers: BTreeMap<String, SignalSchema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    signal_emitters: BTreeMap<String, SignalSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display: Option<DisplayValue>,
}

impl StepSchema {
    pub fn new(
        id: impl Into<String>,
        input: ScopeSchema,
        outputs: impl IntoIterator<Item = (String, StepOutputSchema)>,
    ) -> Self {
        Self {
            id: id.into(),
            input,
            outputs: outputs.into_iter().collect(),
            signal_handlers: BTreeMap::new(),
            signal_emitters: BTreeMap::new(),
            display: None,
        }
    }

    /// Signals the step accepts while running
    pub fn with_signal_handlers(mut self, signals: impl IntoIterator<Item = SignalSchema>) -> Self {
        self.signal_handlers = signals
            .into_iter()
            .map(|signal| (signal.id.clone(), signal))
            .collect();
        self
    }

    /// Signals the step emits while running
    pub fn with_signal_emitters(mut self, signals: impl IntoIterator<Item = SignalSchema>) -> Self {
        self.signal_emitters = signals
            .into_iter()
            .map(|signal| (signal.id.clone(), signal))
            .collect();
        self
    }

    pub fn with_display(mut self, display: DisplayValue) -> Self {
        self.display = Some(display);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input(&self) -> &ScopeSchema {
        &self.input
    }

    pub fn outputs(&self) -> &BTreeMap<String, StepOutputSchema> {
        &self.outputs
    }

    pub fn output(&self, id: &str) -> Option<&StepOutputSchema> {
        self.outputs.get(id)
    }

    pub fn signal_handler(&self, id: &str) -> Option<&SignalSchema> {
        self.signal_handlers.get(id)
    }

    pub fn signal_emitter(&self, id: &str) -> Option<&SignalSchema> {
        self.signal_emitters.get(id)
    }

    pub fn display(&self) -> Option<&DisplayValue> {
        self.display.as_ref()
    }
}

/// A possible outcome of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutputSchema {
    pub schema: ScopeSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayValue>,
    /// Whether this output reports a failure
    #[serde(default)]
    pub error: bool,
}

impl StepOutputSchema {
    pub fn new(schema: ScopeSchema) -> Self {
        Self {
            schema,
            display: None,
            error: false,
        }
    }

    pub fn error(schema: ScopeSchema) -> Self {
        Self {
            error: true,
            ..Self::new(schema)
        }
    }
}

/// Data carried by a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSchema {
    id: String,
    data: ScopeSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display: Option<DisplayValue>,
}

impl SignalSchema {
    pub fn new(id: impl Into<String>, data: ScopeSchema) -> Self {
        Self {
            id: id.into(),
            data,
            display: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &ScopeSchema {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema_json() -> Value {
        json!({
            "steps": {
                "greet": {
                    "id": "greet",
                    "input": {
                        "root": "Input",
                        "objects": {
                            "Input": {
                                "id": "Input",
                                "properties": {
                                    "name": {"type": {"type_id": "string"}, "required": true}
                                }
                            }
                        }
                    },
                    "outputs": {
                        "success": {
                            "schema": {
                                "root": "Output",
                                "objects": {"Output": {"id": "Output", "properties": {}}}
                            }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn unserializes_steps() {
        let schema = Schema::from_value(schema_json()).unwrap();
        let step = schema.step("greet").unwrap();
        assert_eq!(step.input().root(), "Input");
        assert!(step.output("success").is_some_and(|output| !output.error));
        assert!(step.signal_handler("stop").is_none());

        let err = schema.step("wave").unwrap_err();
        assert!(matches!(err, SchemaError::NoSuchStep { ref step } if step == "wave"));
    }

    #[test]
    fn serialized_form_round_trips() {
        let schema = Schema::from_value(schema_json()).unwrap();
        let again = Schema::from_value(schema.to_value().unwrap()).unwrap();
        assert_eq!(again, schema);
    }

    #[test]
    fn invalid_scope_is_a_bad_argument() {
        let mut value = schema_json();
        value["steps"]["greet"]["input"]["root"] = json!("Missing");
        assert!(Schema::from_value(value).unwrap_err().is_bad_argument());

        let mut value = schema_json();
        value["steps"]["greet"]["id"] = json!("other");
        assert!(Schema::from_value(value).unwrap_err().is_bad_argument());
    }
}
