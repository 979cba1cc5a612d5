//! Conversion between the editor and execution workflow formats.
//!
//! Editor → execution resolves each linked input slot through the link
//! table and assigns widget values, in order, to the slots without a
//! resolvable link. Execution → editor synthesizes one link per link-valued
//! input and places nodes on a fixed grid.
//!
//! Output indexes are not checked against the source class here; see
//! [`SchemaRegistry::validate_with`](crate::registry::SchemaRegistry::validate_with).

use std::collections::HashMap;

use serde_json::Value;

use crate::config::LayoutConfig;
use crate::editor::{EditorGraph, EditorLink, EditorNode, InputSlot, ANY_SLOT_TYPE};
use crate::error::CoreError;
use crate::graph::{ExecutionGraph, ExecutionNode, InputValue};

/// Name prefix for widget values of nodes that declare no input slots.
pub const FALLBACK_PARAM_PREFIX: &str = "param_";

// ---------------------------------------------------------------------------
// Editor -> execution
// ---------------------------------------------------------------------------

/// Convert an editor graph to the execution format.
pub fn editor_to_execution(editor: &EditorGraph) -> ExecutionGraph {
    let link_origins: HashMap<i64, (i64, i64)> = editor
        .links
        .iter()
        .map(|link| (link.id, (link.origin_id, link.origin_slot)))
        .collect();

    let mut graph = ExecutionGraph::new();
    for node in &editor.nodes {
        if node.class_type.is_empty() {
            tracing::debug!(node_id = node.id, "Skipping editor node without a type");
            continue;
        }

        let mut exec_node = ExecutionNode::new(node.class_type.clone());

        if node.inputs.is_empty() {
            // Degraded path: no slot names to attach widget values to.
            for (index, value) in node.widgets_values.iter().enumerate() {
                exec_node.inputs.insert(
                    format!("{FALLBACK_PARAM_PREFIX}{index}"),
                    InputValue::Literal(value.clone()),
                );
            }
        } else {
            let mut widgets = node.widgets_values.iter();
            for slot in &node.inputs {
                let origin = slot
                    .link
                    .and_then(|link_id| link_origins.get(&link_id))
                    .and_then(|&(origin_id, origin_slot)| {
                        u32::try_from(origin_slot).ok().map(|index| (origin_id, index))
                    });

                match origin {
                    Some((origin_id, origin_slot)) => {
                        exec_node.inputs.insert(
                            slot.name.clone(),
                            InputValue::link(origin_id.to_string(), origin_slot),
                        );
                    }
                    None => {
                        if let Some(value) = widgets.next() {
                            exec_node
                                .inputs
                                .insert(slot.name.clone(), InputValue::Literal(value.clone()));
                        }
                    }
                }
            }
        }

        graph.insert(node.id.to_string(), exec_node);
    }
    graph
}

// ---------------------------------------------------------------------------
// Execution -> editor
// ---------------------------------------------------------------------------

/// Convert an execution graph to the editor format.
///
/// Every node id and every link source must be a non-negative integer in
/// canonical decimal form; other ids are rejected rather than renumbered. Link-valued inputs become linked
/// slots; literal inputs become widget slots whose values are appended to
/// `widgets_values` in input order.
pub fn execution_to_editor(
    graph: &ExecutionGraph,
    layout: &LayoutConfig,
) -> Result<EditorGraph, CoreError> {
    let mut editor = EditorGraph::default();
    let mut next_link_id: i64 = 1;

    for (index, (node_id, node)) in graph.iter().enumerate() {
        let id = parse_numeric_id(node_id, node_id)?;

        let mut editor_node = EditorNode::new(id, node.class_type.clone());
        editor_node.pos = layout.position(index);
        editor_node.size = [layout.node_width, layout.node_height];
        editor_node.order = index;

        for (input_name, value) in &node.inputs {
            match value {
                InputValue::Link {
                    source,
                    output_index,
                } => {
                    let origin_id = parse_numeric_id(source, node_id)?;
                    editor.links.push(EditorLink {
                        id: next_link_id,
                        origin_id,
                        origin_slot: i64::from(*output_index),
                        target_id: id,
                        target_slot: editor_node.inputs.len() as i64,
                        data_type: ANY_SLOT_TYPE.to_string(),
                    });
                    editor_node
                        .inputs
                        .push(InputSlot::linked(input_name.clone(), next_link_id));
                    next_link_id += 1;
                }
                InputValue::Literal(literal) => {
                    editor_node.inputs.push(InputSlot::widget(input_name.clone()));
                    editor_node.widgets_values.push(literal.clone());
                }
            }
        }

        editor.last_node_id = editor.last_node_id.max(id);
        editor.nodes.push(editor_node);
    }

    editor.last_link_id = next_link_id - 1;
    Ok(editor)
}

/// Parse a node id written in canonical decimal form.
///
/// `"01"`, `"+1"` and `"-3"` are rejected so that distinct execution ids
/// never collapse onto the same editor id.
fn parse_numeric_id(id: &str, node_id: &str) -> Result<i64, CoreError> {
    id.parse::<i64>()
        .ok()
        .filter(|&parsed| parsed >= 0 && parsed.to_string() == id)
        .ok_or_else(|| {
            CoreError::malformed_node(
                node_id,
                format!(
                    "Node id '{id}' is not a non-negative integer; the editor format requires numeric ids"
                ),
            )
        })
}

// ---------------------------------------------------------------------------
// Shape validation
// ---------------------------------------------------------------------------

/// Check that `json` is structurally an execution-format graph.
///
/// The document must be a non-empty object whose entries are objects with
/// both `class_type` and `inputs` keys. No registry lookup is performed.
pub fn validate_execution_shape(json: &Value) -> Result<(), CoreError> {
    let obj = json
        .as_object()
        .filter(|obj| !obj.is_empty())
        .ok_or_else(|| CoreError::malformed("Workflow must be a non-empty JSON object"))?;

    for (node_id, node) in obj {
        let Some(node) = node.as_object() else {
            return Err(CoreError::malformed_node(
                node_id,
                format!("Node {node_id} must be an object"),
            ));
        };
        if !node.contains_key("class_type") {
            return Err(CoreError::malformed_node(
                node_id,
                format!("Node {node_id} missing 'class_type'"),
            ));
        }
        if !node.contains_key("inputs") {
            return Err(CoreError::malformed_node(
                node_id,
                format!("Node {node_id} missing 'inputs'"),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
