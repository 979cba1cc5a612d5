//! Repairs for mistakes language models commonly make in generated graphs.
//!
//! Numeric node references (`[1, 0]` instead of `["1", 0]`) that already
//! classify as links are normalized when the graph is parsed by
//! [`InputValue::from_json`], and a parsed node always carries an inputs
//! map. What remains is class-name correction through an [`AliasTable`] and
//! the numeric heads of pairs that did not parse as links (`[1, 1.0]`,
//! `[2.0, 0]`).

use serde_json::Value;

use crate::config::AliasTable;
use crate::graph::{ExecutionGraph, InputValue};

/// Apply class-name corrections and stringify numeric pair heads.
///
/// Total and idempotent: `auto_fix(&auto_fix(g, t), t) == auto_fix(g, t)`.
pub fn auto_fix(graph: &ExecutionGraph, aliases: &AliasTable) -> ExecutionGraph {
    let mut fixed = graph.clone();
    for (node_id, node) in fixed.iter_mut() {
        if let Some(canonical) = aliases.resolve(&node.class_type) {
            tracing::debug!(
                node_id = %node_id,
                from = %node.class_type,
                to = canonical,
                "Corrected node class name"
            );
            node.class_type = canonical.to_string();
        }

        for (input_name, value) in node.inputs.iter_mut() {
            let InputValue::Literal(raw) = value else {
                continue;
            };
            let Some(repaired) = stringify_numeric_head(raw) else {
                continue;
            };
            tracing::debug!(
                node_id = %node_id,
                input = %input_name,
                "Converted numeric node reference to string"
            );
            *value = InputValue::from_json(&repaired);
        }
    }
    fixed
}

/// `[n, x]` with a numeric `n` becomes `["n", x]`. Floats are truncated
/// toward zero.
fn stringify_numeric_head(raw: &Value) -> Option<Value> {
    let [Value::Number(head), second] = raw.as_array()?.as_slice() else {
        return None;
    };
    let head = if let Some(n) = head.as_i64() {
        n.to_string()
    } else if let Some(n) = head.as_u64() {
        n.to_string()
    } else {
        (head.as_f64()?.trunc() as i64).to_string()
    };
    Some(Value::Array(vec![Value::String(head), second.clone()]))
}
