//! Workflow event and action response envelopes
//!
//! The automation platform posts an event carrying named fields and expects
//! `{"outputFields": {...}}` back. Depending on how the action is wired,
//! fields arrive under `inputFields` (configured inputs) or `fields`
//! (copied record properties), so lookups check both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound workflow event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    /// Action input fields configured on the workflow step
    #[serde(default)]
    pub input_fields: Map<String, Value>,

    /// Record properties copied into the event
    #[serde(default)]
    pub fields: Map<String, Value>,

    /// Record that enrolled in the workflow
    #[serde(default)]
    pub object: Option<EventObject>,
}

/// Enrolled record reference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventObject {
    pub object_id: Value,
    #[serde(default)]
    pub object_type: Option<String>,
}

impl WorkflowEvent {
    /// Build an event with a single `fields` entry
    pub fn with_field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(name.into(), value.into());
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Look up a field as a string
    ///
    /// Checks `inputFields` first, then `fields`. Numbers are rendered as
    /// strings; null, blank, and non-scalar values count as absent.
    pub fn field(&self, name: &str) -> Option<String> {
        self.input_fields
            .get(name)
            .and_then(scalar_to_string)
            .or_else(|| self.fields.get(name).and_then(scalar_to_string))
    }

    /// Enrolled object id rendered as a string
    pub fn object_id(&self) -> Option<String> {
        self.object.as_ref().and_then(|o| scalar_to_string(&o.object_id))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Action response returned to the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub output_fields: Map<String, Value>,
}

impl ActionResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output field (builder style)
    pub fn output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output_fields.insert(name.into(), value.into());
        self
    }
}
