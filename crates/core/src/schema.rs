//! Node class signatures and schema document parsing.
//!
//! Two document shapes describe the same signatures:
//!
//! - the engine's `/object_info` shape, where inputs are grouped under
//!   `input.required` / `input.optional` as `[type_or_options, metadata]`
//!   pairs and outputs are a type array with a parallel `output_name` array;
//! - the cache shape written by [`signature_to_cache_entry`], with flat
//!   `inputs` / `outputs` lists.
//!
//! [`parse_class_entry`] accepts either, per entry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Input type assigned to closed enumerations.
pub const COMBO_TYPE: &str = "COMBO";

/// Category assigned to classes that do not declare one.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// One input of a node class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    /// Type token, e.g. `"MODEL"`, `"INT"`, or [`COMBO_TYPE`].
    #[serde(rename = "type")]
    pub input_type: String,
    pub required: bool,
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Allowed values when the input is a [`COMBO_TYPE`] enumeration.
    #[serde(rename = "options", default, skip_serializing_if = "Option::is_none")]
    pub enum_options: Option<Vec<Value>>,
}

/// One output of a node class. Outputs are referenced by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub output_type: String,
}

/// Signature of a node class as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeClassSignature {
    pub class_name: String,
    pub display_name: String,
    pub category: String,
    pub description: String,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
    /// Declared as an output (sink) node by the engine.
    pub is_output_node: bool,
}

impl NodeClassSignature {
    /// Whether the class may end a graph without a downstream consumer.
    pub fn is_terminal(&self) -> bool {
        self.is_output_node || self.outputs.is_empty()
    }

    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn required_inputs(&self) -> impl Iterator<Item = &InputSpec> {
        self.inputs.iter().filter(|i| i.required)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one class entry of a schema or cache document.
///
/// Returns `None` when the entry is not an object or its outputs are not a
/// list. Individual inputs with an unreadable type descriptor are dropped.
pub fn parse_class_entry(class_name: &str, entry: &Value) -> Option<NodeClassSignature> {
    let obj = entry.as_object()?;

    let (inputs, outputs) = if obj.get("inputs").is_some_and(Value::is_array) {
        (parse_cache_inputs(obj)?, parse_cache_outputs(obj)?)
    } else {
        (parse_vendor_inputs(class_name, obj), parse_vendor_outputs(obj)?)
    };

    Some(NodeClassSignature {
        class_name: class_name.to_string(),
        display_name: string_field(obj, "display_name").unwrap_or(class_name).to_string(),
        category: string_field(obj, "category")
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string(),
        description: string_field(obj, "description").unwrap_or_default().to_string(),
        inputs,
        outputs,
        is_output_node: obj
            .get("output_node")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Inputs from `input.required` then `input.optional`.
fn parse_vendor_inputs(class_name: &str, obj: &Map<String, Value>) -> Vec<InputSpec> {
    let mut inputs = Vec::new();
    let Some(groups) = obj.get("input") else {
        return inputs;
    };

    for (group, required) in [("required", true), ("optional", false)] {
        let Some(entries) = groups.get(group).and_then(Value::as_object) else {
            continue;
        };
        for (name, descriptor) in entries {
            match parse_input_descriptor(name, descriptor, required) {
                Some(spec) => inputs.push(spec),
                None => tracing::debug!(
                    class_name,
                    input = %name,
                    "Skipping input with unreadable type descriptor"
                ),
            }
        }
    }
    inputs
}

/// Parse a `[type_or_options, metadata?]` descriptor.
fn parse_input_descriptor(name: &str, descriptor: &Value, required: bool) -> Option<InputSpec> {
    let parts = descriptor.as_array()?;
    let (input_type, enum_options) = match parts.first()? {
        Value::String(type_token) => (type_token.clone(), None),
        Value::Array(options) => (COMBO_TYPE.to_string(), Some(options.clone())),
        _ => return None,
    };

    let default_value = parts
        .get(1)
        .and_then(|meta| meta.get("default"))
        .cloned();

    Some(InputSpec {
        name: name.to_string(),
        input_type,
        required,
        default_value,
        enum_options,
    })
}

fn parse_vendor_outputs(obj: &Map<String, Value>) -> Option<Vec<OutputSpec>> {
    let Some(raw) = obj.get("output") else {
        return Some(Vec::new());
    };
    let types = raw.as_array()?;
    let names = obj.get("output_name").and_then(Value::as_array);

    let outputs = types
        .iter()
        .enumerate()
        .map(|(i, type_token)| {
            // List-valued outputs are enumerations.
            let output_type = match type_token {
                Value::String(s) => s.clone(),
                Value::Array(_) => COMBO_TYPE.to_string(),
                other => other.to_string(),
            };
            let name = names
                .and_then(|n| n.get(i))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| output_type.clone());
            OutputSpec { name, output_type }
        })
        .collect();
    Some(outputs)
}

fn parse_cache_inputs(obj: &Map<String, Value>) -> Option<Vec<InputSpec>> {
    serde_json::from_value(obj.get("inputs")?.clone()).ok()
}

fn parse_cache_outputs(obj: &Map<String, Value>) -> Option<Vec<OutputSpec>> {
    match obj.get("outputs") {
        Some(raw) => serde_json::from_value(raw.clone()).ok(),
        None => Some(Vec::new()),
    }
}

// ---------------------------------------------------------------------------
// Cache serialization
// ---------------------------------------------------------------------------

/// Serialize a signature in the flat cache shape.
pub fn signature_to_cache_entry(signature: &NodeClassSignature) -> Value {
    json!({
        "display_name": signature.display_name,
        "category": signature.category,
        "description": signature.description,
        "output_node": signature.is_output_node,
        "inputs": signature.inputs,
        "outputs": signature.outputs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
