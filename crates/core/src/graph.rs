//! Execution-format workflow graph.
//!
//! The engine executes a flat object keyed by node id, where each entry
//! carries a `class_type` and an `inputs` map:
//!
//! ```json
//! {
//!   "1": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "a.safetensors" } },
//!   "2": { "class_type": "CLIPTextEncode", "inputs": { "text": "cat", "clip": ["1", 1] } }
//! }
//! ```
//!
//! Input values are either literals or links (`[source_node_id, output_index]`).
//! [`InputValue::from_json`] is the single place where that distinction is made.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Node ids are strings in the execution format (conventionally decimal).
pub type NodeId = String;

// ---------------------------------------------------------------------------
// Input values
// ---------------------------------------------------------------------------

/// A single node input: a literal value or a link to another node's output.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Any JSON value that is not a link.
    Literal(Value),
    /// Reference to output `output_index` of node `source`.
    Link { source: NodeId, output_index: u32 },
}

impl InputValue {
    /// Build a link to `source`'s output `output_index`.
    pub fn link(source: impl Into<NodeId>, output_index: u32) -> Self {
        Self::Link {
            source: source.into(),
            output_index,
        }
    }

    /// Classify a raw JSON input value.
    ///
    /// A two-element array whose first element is a string or an integer and
    /// whose second element is a non-negative integer is a link. Integer node
    /// references are normalized to their decimal string form, since the
    /// engine requires string ids and language models often emit numbers.
    pub fn from_json(value: &Value) -> Self {
        if let Some([first, second]) = value.as_array().map(Vec::as_slice) {
            let source = match first {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
                _ => None,
            };
            let output_index = second.as_u64().and_then(|n| u32::try_from(n).ok());

            if let (Some(source), Some(output_index)) = (source, output_index) {
                return Self::Link {
                    source,
                    output_index,
                };
            }
        }
        Self::Literal(value.clone())
    }

    /// Serialize back to the execution-format JSON shape.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Link {
                source,
                output_index,
            } => Value::Array(vec![
                Value::String(source.clone()),
                Value::from(*output_index),
            ]),
        }
    }

    /// The `(source, output_index)` pair if this input is a link.
    pub fn as_link(&self) -> Option<(&str, u32)> {
        match self {
            Self::Link {
                source,
                output_index,
            } => Some((source.as_str(), *output_index)),
            Self::Literal(_) => None,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link { .. })
    }
}

// ---------------------------------------------------------------------------
// Nodes and graphs
// ---------------------------------------------------------------------------

/// One entry of an execution graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionNode {
    /// Node class name, e.g. `"KSampler"`.
    pub class_type: String,
    /// Inputs by name, in the order they were written.
    pub inputs: IndexMap<String, InputValue>,
}

impl ExecutionNode {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: IndexMap::new(),
        }
    }

    /// Builder-style input insertion.
    pub fn with_input(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }
}

/// A connection read out of an execution graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLink<'a> {
    pub target_node: &'a str,
    pub target_input: &'a str,
    pub source_node: &'a str,
    pub output_index: u32,
}

/// Flat execution-format graph: node id to node, in stored order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionGraph {
    nodes: IndexMap<NodeId, ExecutionNode>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node, returning the previous one.
    pub fn insert(&mut self, id: impl Into<NodeId>, node: ExecutionNode) -> Option<ExecutionNode> {
        self.nodes.insert(id.into(), node)
    }

    pub fn get(&self, id: &str) -> Option<&ExecutionNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ExecutionNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &ExecutionNode)> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&NodeId, &mut ExecutionNode)> {
        self.nodes.iter_mut()
    }

    /// Every link in the graph, in node order then input order.
    pub fn links(&self) -> Vec<GraphLink<'_>> {
        self.nodes
            .iter()
            .flat_map(|(node_id, node)| {
                node.inputs.iter().filter_map(move |(input_name, value)| {
                    value.as_link().map(|(source, output_index)| GraphLink {
                        target_node: node_id,
                        target_input: input_name,
                        source_node: source,
                        output_index,
                    })
                })
            })
            .collect()
    }

    /// Parse an execution-format JSON document.
    ///
    /// Every entry must be an object with a string `class_type` and an
    /// `inputs` object (`null` is read as no inputs). The document must
    /// contain at least one node.
    pub fn from_json(json: &Value) -> Result<Self, CoreError> {
        let obj = json
            .as_object()
            .filter(|obj| !obj.is_empty())
            .ok_or_else(|| CoreError::malformed("Workflow must be a non-empty JSON object"))?;

        let mut nodes = IndexMap::with_capacity(obj.len());
        for (node_id, node_value) in obj {
            let class_type = match node_value.get("class_type") {
                Some(Value::String(class_type)) => class_type,
                Some(_) => {
                    return Err(CoreError::malformed_node(
                        node_id,
                        format!("Node {node_id} 'class_type' must be a string"),
                    ))
                }
                None => {
                    return Err(CoreError::malformed_node(
                        node_id,
                        format!("Node {node_id} missing 'class_type'"),
                    ))
                }
            };

            // A null inputs value reads as an empty map.
            let empty = Map::new();
            let raw_inputs = match node_value.get("inputs") {
                Some(Value::Object(inputs)) => inputs,
                Some(Value::Null) => &empty,
                Some(_) => {
                    return Err(CoreError::malformed_node(
                        node_id,
                        format!("Node {node_id} 'inputs' must be an object"),
                    ))
                }
                None => {
                    return Err(CoreError::malformed_node(
                        node_id,
                        format!("Node {node_id} missing 'inputs'"),
                    ))
                }
            };

            let inputs = raw_inputs
                .iter()
                .map(|(name, value)| (name.clone(), InputValue::from_json(value)))
                .collect();

            nodes.insert(
                node_id.clone(),
                ExecutionNode {
                    class_type: class_type.to_string(),
                    inputs,
                },
            );
        }

        Ok(Self { nodes })
    }

    /// Serialize to the execution-format JSON document.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::with_capacity(self.nodes.len());
        for (node_id, node) in &self.nodes {
            let inputs: Map<String, Value> = node
                .inputs
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect();

            let mut entry = Map::new();
            entry.insert("class_type".into(), Value::String(node.class_type.clone()));
            entry.insert("inputs".into(), Value::Object(inputs));
            obj.insert(node_id.clone(), Value::Object(entry));
        }
        Value::Object(obj)
    }
}

impl FromIterator<(NodeId, ExecutionNode)> for ExecutionGraph {
    fn from_iter<T: IntoIterator<Item = (NodeId, ExecutionNode)>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // -- InputValue::from_json ----------------------------------------------

    #[test]
    fn string_id_pair_is_link() {
        let value = InputValue::from_json(&json!(["4", 0]));
        assert_eq!(value, InputValue::link("4", 0));
    }

    #[test]
    fn numeric_id_pair_is_normalized_to_string_link() {
        let value = InputValue::from_json(&json!([1, 1]));
        assert_eq!(value.as_link(), Some(("1", 1)));
        assert_eq!(value.to_json(), json!(["1", 1]));
    }

    #[test]
    fn scalars_and_objects_are_literals() {
        for raw in [json!(42), json!("euler"), json!(7.5), json!({"a": 1}), json!(null)] {
            assert_eq!(InputValue::from_json(&raw), InputValue::Literal(raw.clone()));
        }
    }

    #[test]
    fn pairs_that_are_not_links_stay_literal() {
        // Float index, negative index, three elements, float source.
        for raw in [
            json!(["1", 0.5]),
            json!(["1", -1]),
            json!(["1", 0, 2]),
            json!([1.5, 0]),
            json!([512, "wide"]),
        ] {
            assert!(!InputValue::from_json(&raw).is_link(), "{raw} should be a literal");
        }
    }

    // -- ExecutionGraph::from_json ------------------------------------------

    #[test]
    fn parse_preserves_node_and_input_order() {
        let json = json!({
            "10": { "class_type": "SaveImage", "inputs": { "images": ["2", 0], "filename_prefix": "out" } },
            "2": { "class_type": "VAEDecode", "inputs": {} }
        });
        let graph = ExecutionGraph::from_json(&json).unwrap();
        let ids: Vec<_> = graph.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["10", "2"]);

        let save = graph.get("10").unwrap();
        let names: Vec<_> = save.inputs.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["images", "filename_prefix"]);
    }

    #[test]
    fn parse_rejects_missing_class_type() {
        let err = ExecutionGraph::from_json(&json!({"1": {"inputs": {}}})).unwrap_err();
        assert_matches!(err, CoreError::MalformedInput { node_id: Some(ref id), .. } if id == "1");
    }

    #[test]
    fn parse_reports_non_string_class_type() {
        let err = ExecutionGraph::from_json(&json!({"1": {"class_type": 5, "inputs": {}}})).unwrap_err();
        assert_eq!(err.to_string(), "Node 1 'class_type' must be a string");
        assert_eq!(err.node_id(), Some("1"));
    }

    #[test]
    fn parse_reads_null_inputs_as_empty() {
        let graph =
            ExecutionGraph::from_json(&json!({"1": {"class_type": "SaveImage", "inputs": null}})).unwrap();
        assert!(graph.get("1").unwrap().inputs.is_empty());
        assert_eq!(graph.to_json()["1"]["inputs"], json!({}));
    }

    #[test]
    fn parse_rejects_non_object_inputs() {
        let err =
            ExecutionGraph::from_json(&json!({"1": {"class_type": "X", "inputs": [1, 2]}})).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn parse_rejects_empty_document() {
        assert!(ExecutionGraph::from_json(&json!({})).is_err());
        assert!(ExecutionGraph::from_json(&json!([])).is_err());
    }

    #[test]
    fn to_json_writes_links_as_string_pairs() {
        let mut graph = ExecutionGraph::new();
        graph.insert(
            "2",
            ExecutionNode::new("CLIPTextEncode")
                .with_input("text", InputValue::Literal(json!("cat")))
                .with_input("clip", InputValue::link("1", 1)),
        );
        assert_eq!(
            graph.to_json(),
            json!({"2": {"class_type": "CLIPTextEncode", "inputs": {"text": "cat", "clip": ["1", 1]}}})
        );
    }

    // -- links ----------------------------------------------------------------

    #[test]
    fn links_lists_every_connection() {
        let json = json!({
            "3": { "class_type": "KSampler", "inputs": { "seed": 1, "model": ["1", 0], "positive": ["6", 0] } },
            "8": { "class_type": "VAEDecode", "inputs": { "samples": ["3", 0], "vae": ["1", 2] } }
        });
        let graph = ExecutionGraph::from_json(&json).unwrap();
        let links = graph.links();
        assert_eq!(links.len(), 4);
        assert_eq!(
            links[3],
            GraphLink {
                target_node: "8",
                target_input: "vae",
                source_node: "1",
                output_index: 2,
            }
        );
    }
}
