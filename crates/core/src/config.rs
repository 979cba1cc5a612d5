//! Pipeline configuration.
//!
//! All settings deserialize with defaults for missing fields, so a
//! composing application can load a partial document from any source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Grid placement used when synthesizing an editor graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Nodes per row before wrapping to the next row.
    pub nodes_per_row: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    /// Horizontal distance between node origins.
    pub column_spacing: f64,
    /// Vertical distance between rows.
    pub row_spacing: f64,
    pub node_width: f64,
    pub node_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            nodes_per_row: 4,
            origin_x: 100.0,
            origin_y: 100.0,
            column_spacing: 350.0,
            row_spacing: 250.0,
            node_width: 300.0,
            node_height: 200.0,
        }
    }
}

impl LayoutConfig {
    /// Position of the `index`-th node on the grid.
    pub fn position(&self, index: usize) -> [f64; 2] {
        let per_row = self.nodes_per_row.max(1);
        let column = index % per_row;
        let row = index / per_row;
        [
            self.origin_x + column as f64 * self.column_spacing,
            self.origin_y + row as f64 * self.row_spacing,
        ]
    }
}

// ---------------------------------------------------------------------------
// Class-name aliases
// ---------------------------------------------------------------------------

/// Class-name corrections for mistakes language models commonly make.
///
/// Serialized as a plain `{"alias": "Canonical"}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert("CheckpointLoader", "CheckpointLoaderSimple");
        table.insert("TextEncode", "CLIPTextEncode");
        table.insert("CLIPEncode", "CLIPTextEncode");
        table
    }
}

impl AliasTable {
    /// A table with no corrections.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.entries.insert(alias.into(), canonical.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The canonical class for `class_type`, or `None` if no correction applies.
    ///
    /// Chains (`A -> B -> C`) resolve to their final target. Entries that
    /// form a cycle are ignored.
    pub fn resolve(&self, class_type: &str) -> Option<&str> {
        let mut visited = vec![class_type];
        let mut current = self.entries.get(class_type)?.as_str();
        while let Some(next) = self.entries.get(current) {
            if visited.contains(&current) {
                return None;
            }
            visited.push(current);
            current = next.as_str();
        }
        if visited.contains(&current) {
            return None;
        }
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Validation strictness
// ---------------------------------------------------------------------------

/// How much link checking registry validation performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStrictness {
    /// Class existence and dangling links only. Output indexes are left to
    /// the engine.
    #[default]
    Permissive,
    /// Additionally reject links whose output index exceeds the source
    /// class's declared outputs.
    Strict,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Settings consumed by [`WorkflowBuilder`](crate::builder::WorkflowBuilder).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: LayoutConfig,
    pub aliases: AliasTable,
    pub strictness: ValidationStrictness,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn layout_wraps_after_row_width() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.position(0), [100.0, 100.0]);
        assert_eq!(layout.position(3), [1150.0, 100.0]);
        assert_eq!(layout.position(4), [100.0, 350.0]);
    }

    #[test]
    fn zero_row_width_places_one_per_row() {
        let layout = LayoutConfig {
            nodes_per_row: 0,
            ..Default::default()
        };
        assert_eq!(layout.position(2), [100.0, 600.0]);
    }

    #[test]
    fn default_aliases_cover_known_mistakes() {
        let aliases = AliasTable::default();
        assert_eq!(aliases.resolve("CheckpointLoader"), Some("CheckpointLoaderSimple"));
        assert_eq!(aliases.resolve("TextEncode"), Some("CLIPTextEncode"));
        assert_eq!(aliases.resolve("CLIPEncode"), Some("CLIPTextEncode"));
        assert_eq!(aliases.resolve("KSampler"), None);
    }

    #[test]
    fn alias_chains_resolve_to_final_target() {
        let mut aliases = AliasTable::empty();
        aliases.insert("A", "B");
        aliases.insert("B", "C");
        assert_eq!(aliases.resolve("A"), Some("C"));
        assert_eq!(aliases.resolve("B"), Some("C"));
    }

    #[test]
    fn alias_cycles_are_ignored() {
        let mut aliases = AliasTable::empty();
        aliases.insert("A", "B");
        aliases.insert("B", "A");
        aliases.insert("C", "C");
        assert_eq!(aliases.resolve("A"), None);
        assert_eq!(aliases.resolve("B"), None);
        assert_eq!(aliases.resolve("C"), None);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "layout": { "nodes_per_row": 2 },
            "aliases": { "Sampler": "KSampler" },
            "strictness": "strict"
        }))
        .unwrap();
        assert_eq!(config.layout.nodes_per_row, 2);
        assert_eq!(config.layout.column_spacing, 350.0);
        assert_eq!(config.aliases.resolve("Sampler"), Some("KSampler"));
        assert_eq!(config.aliases.len(), 1);
        assert_eq!(config.strictness, ValidationStrictness::Strict);
    }
}
