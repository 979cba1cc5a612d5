//! Editor-format workflow graph.
//!
//! The visual editor stores a node list, an explicit link list, and the
//! values of each node's widgets in slot order. Links are written as
//! arrays `[id, origin_id, origin_slot, target_id, target_slot, type]` by
//! the engine's editor, while some exporters write objects with the same
//! fields; both are read.

use serde_json::{json, Map, Value};

use crate::error::CoreError;

/// Slot type written when the real data type is not known.
pub const ANY_SLOT_TYPE: &str = "*";

/// Editor node property carrying the class name for search-and-replace.
const NODE_NAME_PROPERTY: &str = "Node name for S&R";

/// Format version written into serialized editor documents.
const EDITOR_FORMAT_VERSION: f64 = 0.4;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// An input slot on an editor node.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSlot {
    pub name: String,
    pub slot_type: String,
    /// Id of the link feeding this slot, if connected.
    pub link: Option<i64>,
    /// Whether the slot is backed by a widget value.
    pub widget: bool,
}

impl InputSlot {
    pub fn linked(name: impl Into<String>, link: i64) -> Self {
        Self {
            name: name.into(),
            slot_type: ANY_SLOT_TYPE.to_string(),
            link: Some(link),
            widget: false,
        }
    }

    pub fn widget(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot_type: ANY_SLOT_TYPE.to_string(),
            link: None,
            widget: true,
        }
    }
}

/// A node in an editor graph.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorNode {
    pub id: i64,
    /// Node class name (the editor calls this `type`).
    pub class_type: String,
    pub inputs: Vec<InputSlot>,
    /// Widget values in the order of the unlinked input slots.
    pub widgets_values: Vec<Value>,
    pub pos: [f64; 2],
    pub size: [f64; 2],
    pub order: usize,
}

impl EditorNode {
    pub fn new(id: i64, class_type: impl Into<String>) -> Self {
        Self {
            id,
            class_type: class_type.into(),
            inputs: Vec::new(),
            widgets_values: Vec::new(),
            pos: [0.0, 0.0],
            size: [0.0, 0.0],
            order: 0,
        }
    }
}

/// A link from one node's output slot to another node's input slot.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorLink {
    pub id: i64,
    pub origin_id: i64,
    pub origin_slot: i64,
    pub target_id: i64,
    pub target_slot: i64,
    pub data_type: String,
}

/// Editor-format graph with the id counters the editor keeps allocating from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorGraph {
    pub nodes: Vec<EditorNode>,
    pub links: Vec<EditorLink>,
    pub last_node_id: i64,
    pub last_link_id: i64,
}

// ---------------------------------------------------------------------------
// JSON reading
// ---------------------------------------------------------------------------

impl EditorGraph {
    /// Parse an editor-format JSON document.
    ///
    /// Requires a `nodes` array. Nodes without an integer `id` or a string
    /// `type` are skipped, as are links that lack an id, origin node, or
    /// origin slot. A missing `links` array reads as no links.
    pub fn from_json(json: &Value) -> Result<Self, CoreError> {
        let raw_nodes = json
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::malformed("Editor workflow must contain a 'nodes' array"))?;

        let nodes: Vec<EditorNode> = raw_nodes
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let node = parse_node(raw, index);
                if node.is_none() {
                    tracing::debug!(index, "Skipping editor node without id or type");
                }
                node
            })
            .collect();

        let links: Vec<EditorLink> = json
            .get("links")
            .and_then(Value::as_array)
            .map(|raw_links| raw_links.iter().filter_map(parse_link).collect())
            .unwrap_or_default();

        let max_node_id = nodes.iter().map(|n| n.id).max().unwrap_or(0);
        let max_link_id = links.iter().map(|l| l.id).max().unwrap_or(0);

        let last_node_id = read_counter(json, "last_node_id", "lastNodeId")
            .unwrap_or(0)
            .max(max_node_id);
        let last_link_id = read_counter(json, "last_link_id", "lastLinkId")
            .unwrap_or(0)
            .max(max_link_id);

        Ok(Self {
            nodes,
            links,
            last_node_id,
            last_link_id,
        })
    }

    /// Serialize to the editor-format JSON document.
    pub fn to_json(&self) -> Value {
        let nodes: Vec<Value> = self.nodes.iter().map(node_to_json).collect();
        let links: Vec<Value> = self
            .links
            .iter()
            .map(|link| {
                json!([
                    link.id,
                    link.origin_id,
                    link.origin_slot,
                    link.target_id,
                    link.target_slot,
                    link.data_type,
                ])
            })
            .collect();

        json!({
            "last_node_id": self.last_node_id,
            "last_link_id": self.last_link_id,
            "nodes": nodes,
            "links": links,
            "groups": [],
            "config": {},
            "extra": {},
            "version": EDITOR_FORMAT_VERSION,
        })
    }
}

/// Read a counter from either the top level or the nested `state` object.
fn read_counter(json: &Value, top_level: &str, state_key: &str) -> Option<i64> {
    json.get(top_level)
        .and_then(Value::as_i64)
        .or_else(|| json.get("state")?.get(state_key)?.as_i64())
}

fn parse_node(raw: &Value, index: usize) -> Option<EditorNode> {
    let id = raw.get("id")?.as_i64()?;
    let class_type = raw.get("type")?.as_str()?;

    let inputs = raw
        .get("inputs")
        .and_then(Value::as_array)
        .map(|slots| slots.iter().filter_map(parse_slot).collect())
        .unwrap_or_default();

    // Some custom nodes store widget state as an object; only the ordered
    // array form maps onto input slots.
    let widgets_values = raw
        .get("widgets_values")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Some(EditorNode {
        id,
        class_type: class_type.to_string(),
        inputs,
        widgets_values,
        pos: read_pair(raw.get("pos")),
        size: read_pair(raw.get("size")),
        order: raw
            .get("order")
            .and_then(Value::as_u64)
            .map(|o| o as usize)
            .unwrap_or(index),
    })
}

fn parse_slot(raw: &Value) -> Option<InputSlot> {
    let name = raw.get("name")?.as_str()?;
    Some(InputSlot {
        name: name.to_string(),
        slot_type: raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(ANY_SLOT_TYPE)
            .to_string(),
        link: raw.get("link").and_then(Value::as_i64),
        widget: raw.get("widget").is_some_and(|w| !w.is_null()),
    })
}

fn parse_link(raw: &Value) -> Option<EditorLink> {
    if let Some(fields) = raw.as_array() {
        let int_at = |i: usize| fields.get(i).and_then(Value::as_i64);
        return Some(EditorLink {
            id: int_at(0)?,
            origin_id: int_at(1)?,
            origin_slot: int_at(2)?,
            target_id: int_at(3).unwrap_or(0),
            target_slot: int_at(4).unwrap_or(0),
            data_type: fields
                .get(5)
                .and_then(Value::as_str)
                .unwrap_or(ANY_SLOT_TYPE)
                .to_string(),
        });
    }

    let obj = raw.as_object()?;
    let int_field = |key: &str| obj.get(key).and_then(Value::as_i64);
    Some(EditorLink {
        id: int_field("id")?,
        origin_id: int_field("origin_id")?,
        origin_slot: int_field("origin_slot")?,
        target_id: int_field("target_id").unwrap_or(0),
        target_slot: int_field("target_slot").unwrap_or(0),
        data_type: obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(ANY_SLOT_TYPE)
            .to_string(),
    })
}

fn read_pair(raw: Option<&Value>) -> [f64; 2] {
    let get = |i: usize| {
        raw.and_then(|v| v.get(i))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };
    [get(0), get(1)]
}

// ---------------------------------------------------------------------------
// JSON writing
// ---------------------------------------------------------------------------

fn node_to_json(node: &EditorNode) -> Value {
    let inputs: Vec<Value> = node
        .inputs
        .iter()
        .map(|slot| {
            let mut obj = Map::new();
            obj.insert("name".into(), Value::String(slot.name.clone()));
            obj.insert("type".into(), Value::String(slot.slot_type.clone()));
            obj.insert("link".into(), slot.link.map_or(Value::Null, Value::from));
            if slot.widget {
                obj.insert("widget".into(), json!({ "name": slot.name }));
            }
            Value::Object(obj)
        })
        .collect();

    json!({
        "id": node.id,
        "type": node.class_type,
        "pos": node.pos,
        "size": node.size,
        "flags": {},
        "order": node.order,
        "mode": 0,
        "inputs": inputs,
        "outputs": [],
        "properties": { NODE_NAME_PROPERTY: node.class_type },
        "widgets_values": node.widgets_values,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
