//! Schema registry of the node classes the engine offers.
//!
//! The registry holds an immutable snapshot of class signatures. Loading a
//! document parses it completely into a new snapshot and swaps it in under a
//! write lock, so readers see either the old or the new contents, never a
//! mix. A failed load leaves the previous snapshot in place.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::config::ValidationStrictness;
use crate::error::CoreError;
use crate::graph::ExecutionGraph;
use crate::schema::{parse_class_entry, signature_to_cache_entry, NodeClassSignature};

/// Immutable set of class signatures, keyed and ordered by class name.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    classes: BTreeMap<String, Arc<NodeClassSignature>>,
}

impl RegistrySnapshot {
    /// Parse a schema or cache document into a snapshot.
    ///
    /// Malformed class entries are skipped. Fails when the document is not
    /// an object or yields no classes at all.
    pub fn from_document(document: &Value) -> Result<Self, CoreError> {
        let obj = document
            .as_object()
            .ok_or_else(|| CoreError::malformed("Schema document must be a JSON object"))?;
        if obj.is_empty() {
            return Err(CoreError::malformed("Schema document contains no node classes"));
        }

        let mut classes = BTreeMap::new();
        for (class_name, entry) in obj {
            match parse_class_entry(class_name, entry) {
                Some(signature) => {
                    classes.insert(class_name.clone(), Arc::new(signature));
                }
                None => tracing::warn!(class_name = %class_name, "Skipping malformed node class entry"),
            }
        }

        if classes.is_empty() {
            return Err(CoreError::malformed(
                "Schema document contains no readable node classes",
            ));
        }
        Ok(Self { classes })
    }

    pub fn get(&self, class_name: &str) -> Option<&Arc<NodeClassSignature>> {
        self.classes.get(class_name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class names in lexicographic order.
    pub fn class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    /// Unique categories in lexicographic order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> =
            self.classes.values().map(|sig| sig.category.clone()).collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Classes in `category`, in lexicographic order.
    pub fn classes_in_category(&self, category: &str) -> Vec<String> {
        self.classes
            .values()
            .filter(|sig| sig.category == category)
            .map(|sig| sig.class_name.clone())
            .collect()
    }

    /// Classes whose display name, category or class name contains `query`,
    /// ignoring case, ordered by class name. A blank query matches all.
    pub fn search(&self, query: &str) -> Vec<Arc<NodeClassSignature>> {
        let query = query.trim().to_lowercase();
        self.classes
            .values()
            .filter(|sig| {
                query.is_empty()
                    || [&sig.display_name, &sig.category, &sig.class_name]
                        .iter()
                        .any(|field| field.to_lowercase().contains(&query))
            })
            .cloned()
            .collect()
    }
}

/// Thread-safe handle to the current registry snapshot.
///
/// Construct one per application (or per test) and pass it by reference.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl SchemaRegistry {
    /// An empty registry. Every lookup reports "not found" until a load.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Holding it pins those contents across reloads.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, next: RegistrySnapshot) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    // ---- loading ----

    /// Replace the contents from an engine `/object_info` document.
    ///
    /// Returns the number of classes loaded.
    pub fn load_from_source(&self, document: &Value) -> Result<usize, CoreError> {
        self.load(document, "engine")
    }

    /// Replace the contents from a cache document written by
    /// [`to_cache_document`](Self::to_cache_document).
    pub fn load_from_cache(&self, document: &Value) -> Result<usize, CoreError> {
        self.load(document, "cache")
    }

    fn load(&self, document: &Value, source: &'static str) -> Result<usize, CoreError> {
        let next = RegistrySnapshot::from_document(document).inspect_err(|e| {
            tracing::warn!(source, error = %e, "Schema load failed, keeping previous registry");
        })?;
        let class_count = next.len();
        self.replace(next);
        tracing::info!(source, class_count, "Loaded node class registry");
        Ok(class_count)
    }

    /// Serialize the current contents in the cache shape.
    pub fn to_cache_document(&self) -> Value {
        let snapshot = self.snapshot();
        let entries: Map<String, Value> = snapshot
            .classes
            .iter()
            .map(|(name, sig)| (name.clone(), signature_to_cache_entry(sig)))
            .collect();
        Value::Object(entries)
    }

    // ---- queries ----

    pub fn lookup(&self, class_name: &str) -> Option<Arc<NodeClassSignature>> {
        self.snapshot().get(class_name).cloned()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.snapshot().get(class_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        !self.is_empty()
    }

    /// Class names in lexicographic order.
    pub fn list_classes(&self) -> Vec<String> {
        self.snapshot().class_names()
    }

    /// Unique categories in lexicographic order.
    pub fn list_categories(&self) -> Vec<String> {
        self.snapshot().categories()
    }

    /// Classes in `category`, in lexicographic order.
    pub fn classes_in_category(&self, category: &str) -> Vec<String> {
        self.snapshot().classes_in_category(category)
    }

    /// Case-insensitive search over display name, category and class name.
    pub fn search(&self, query: &str) -> Vec<Arc<NodeClassSignature>> {
        self.snapshot().search(query)
    }

    // ---- validation ----

    /// Validate class existence and link targets with default strictness.
    pub fn validate(&self, graph: &ExecutionGraph) -> Result<(), CoreError> {
        self.validate_with(graph, ValidationStrictness::default())
    }

    /// Validate a graph against the registry, stopping at the first bad node.
    ///
    /// For each node in stored order: the class must be non-empty and known,
    /// and every link must name a node present in the graph. Under
    /// [`ValidationStrictness::Strict`] each link's output index must also be
    /// within the source class's outputs. Input values are not type-checked.
    pub fn validate_with(
        &self,
        graph: &ExecutionGraph,
        strictness: ValidationStrictness,
    ) -> Result<(), CoreError> {
        let snapshot = self.snapshot();

        for (node_id, node) in graph.iter() {
            if node.class_type.is_empty() {
                return Err(CoreError::malformed_node(
                    node_id,
                    format!("Node {node_id} missing class_type"),
                ));
            }
            if snapshot.get(&node.class_type).is_none() {
                return Err(CoreError::unknown_class(node_id, &node.class_type));
            }

            for (input_name, value) in &node.inputs {
                let Some((source, output_index)) = value.as_link() else {
                    continue;
                };
                let Some(source_node) = graph.get(source) else {
                    return Err(CoreError::malformed_node(
                        node_id,
                        format!("Node {node_id} input '{input_name}' links to missing node {source}"),
                    ));
                };

                if strictness == ValidationStrictness::Strict {
                    let output_count = snapshot
                        .get(&source_node.class_type)
                        .map_or(0, |sig| sig.outputs.len());
                    if output_index as usize >= output_count {
                        return Err(CoreError::malformed_node(
                            node_id,
                            format!(
                                "Node {node_id} input '{input_name}' uses output {output_index} of node {source}, which has {output_count} outputs"
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // ---- summary ----

    /// Describe up to `max_entries` classes for a language-model briefing.
    ///
    /// Categories are visited in sorted order and classes alphabetically
    /// within each; the cap applies across categories and may stop partway
    /// through one.
    pub fn summarize(&self, max_entries: usize) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        let _ = writeln!(out, "Available nodes ({} total):", snapshot.len());

        let mut count = 0;
        'categories: for category in snapshot.categories() {
            if count >= max_entries {
                break;
            }
            let _ = write!(out, "\n## {category}\n");

            for class_name in snapshot.classes_in_category(&category) {
                if count >= max_entries {
                    break 'categories;
                }
                let Some(sig) = snapshot.get(&class_name) else {
                    continue;
                };
                write_class_summary(&mut out, sig);
                count += 1;
            }
        }
        out
    }
}

fn write_class_summary(out: &mut String, sig: &NodeClassSignature) {
    let _ = write!(out, "- **{}**", sig.class_name);
    if !sig.description.is_empty() {
        let _ = write!(out, ": {}", sig.description);
    }

    let inputs: Vec<String> = sig
        .inputs
        .iter()
        .map(|i| format!("{}({})", i.name, i.input_type))
        .collect();
    let outputs: Vec<&str> = sig.outputs.iter().map(|o| o.output_type.as_str()).collect();

    let _ = writeln!(out, "\n  Inputs: {}", inputs.join(", "));
    let _ = writeln!(out, "  Outputs: {}", outputs.join(", "));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExecutionNode, InputValue};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn sample_object_info() -> Value {
        json!({
            "CheckpointLoaderSimple": {
                "input": { "required": { "ckpt_name": [["a.safetensors", "b.safetensors"]] } },
                "output": ["MODEL", "CLIP", "VAE"],
                "category": "loaders"
            },
            "VAELoader": {
                "input": { "required": { "vae_name": [["vae.pt"]] } },
                "output": ["VAE"],
                "category": "loaders"
            },
            "KSampler": {
                "input": { "required": { "model": ["MODEL"], "seed": ["INT", { "default": 0 }] } },
                "output": ["LATENT"],
                "category": "samplers",
                "description": "Denoises a latent"
            }
        })
    }

    fn loaded_registry() -> SchemaRegistry {
        let registry = SchemaRegistry::new();
        registry.load_from_source(&sample_object_info()).unwrap();
        registry
    }

    // -- Loading ----------------------------------------------------------------

    #[test]
    fn empty_registry_reports_not_found() {
        let registry = SchemaRegistry::new();
        assert!(registry.lookup("KSampler").is_none());
        assert!(!registry.is_loaded());
        assert!(registry.list_classes().is_empty());
    }

    #[test]
    fn load_replaces_contents_entirely() {
        let registry = loaded_registry();
        assert_eq!(registry.len(), 3);

        registry
            .load_from_source(&json!({ "SaveImage": { "output": [], "output_node": true } }))
            .unwrap();
        assert_eq!(registry.list_classes(), vec!["SaveImage"]);
        assert!(registry.lookup("KSampler").is_none());
    }

    #[test]
    fn failed_load_keeps_previous_contents() {
        let registry = loaded_registry();

        assert!(registry.load_from_source(&json!({})).is_err());
        assert!(registry.load_from_source(&json!("garbage")).is_err());
        assert!(registry.load_from_source(&json!({ "Bad": 5 })).is_err());

        assert_eq!(registry.len(), 3);
        assert!(registry.contains("KSampler"));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let registry = SchemaRegistry::new();
        let loaded = registry
            .load_from_source(&json!({ "Good": { "output": ["IMAGE"] }, "Bad": [1, 2] }))
            .unwrap();
        assert_eq!(loaded, 1);
        assert!(registry.contains("Good"));
    }

    #[test]
    fn cache_document_round_trips() {
        let registry = loaded_registry();
        let cache = registry.to_cache_document();

        let restored = SchemaRegistry::new();
        restored.load_from_cache(&cache).unwrap();

        assert_eq!(restored.list_classes(), registry.list_classes());
        for name in registry.list_classes() {
            assert_eq!(restored.lookup(&name), registry.lookup(&name));
        }
    }

    #[test]
    fn snapshot_survives_reload() {
        let registry = loaded_registry();
        let pinned = registry.snapshot();
        registry
            .load_from_source(&json!({ "Other": { "output": [] } }))
            .unwrap();
        assert_eq!(pinned.len(), 3);
        assert_eq!(registry.len(), 1);
    }

    // -- Queries ----------------------------------------------------------------

    #[test]
    fn listings_are_sorted() {
        let registry = loaded_registry();
        assert_eq!(
            registry.list_classes(),
            vec!["CheckpointLoaderSimple", "KSampler", "VAELoader"]
        );
        assert_eq!(registry.list_categories(), vec!["loaders", "samplers"]);
        assert_eq!(
            registry.classes_in_category("loaders"),
            vec!["CheckpointLoaderSimple", "VAELoader"]
        );
        assert!(registry.classes_in_category("missing").is_empty());
    }

    #[test]
    fn search_matches_any_field_ignoring_case() {
        let registry = loaded_registry();
        let names = |query: &str| -> Vec<String> {
            registry
                .search(query)
                .iter()
                .map(|sig| sig.class_name.clone())
                .collect()
        };

        assert_eq!(names("LOADER"), vec!["CheckpointLoaderSimple", "VAELoader"]);
        assert_eq!(names("Sampl"), vec!["KSampler"]);
        assert_eq!(names("vae"), vec!["VAELoader"]);
        assert!(names("upscale").is_empty());
    }

    #[test]
    fn blank_search_returns_everything() {
        let registry = loaded_registry();
        assert_eq!(registry.search("").len(), 3);
        assert_eq!(registry.search("   ").len(), 3);
        assert!(SchemaRegistry::new().search("").is_empty());
    }

    // -- Validation -------------------------------------------------------------

    #[test]
    fn validate_rejects_unknown_class_with_node_id() {
        let registry = SchemaRegistry::new();
        registry
            .load_from_source(&json!({ "KSampler": { "output": ["LATENT"] } }))
            .unwrap();

        let mut graph = ExecutionGraph::new();
        graph.insert("1", ExecutionNode::new("KSampler"));
        graph.insert("5", ExecutionNode::new("DoesNotExist"));

        let err = registry.validate(&graph).unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
        assert_eq!(err.node_id(), Some("5"));
        assert!(err.to_string().contains("DoesNotExist"));
    }

    #[test]
    fn validate_rejects_empty_class_type() {
        let registry = loaded_registry();
        let mut graph = ExecutionGraph::new();
        graph.insert("1", ExecutionNode::new(""));
        let err = registry.validate(&graph).unwrap_err();
        assert_matches!(err, CoreError::MalformedInput { .. });
    }

    #[test]
    fn validate_rejects_dangling_link() {
        let registry = loaded_registry();
        let mut graph = ExecutionGraph::new();
        graph.insert(
            "3",
            ExecutionNode::new("KSampler").with_input("model", InputValue::link("99", 0)),
        );
        let err = registry.validate(&graph).unwrap_err();
        assert_eq!(err.node_id(), Some("3"));
        assert!(err.to_string().contains("missing node 99"));
    }

    #[test]
    fn output_index_checked_only_when_strict() {
        let registry = loaded_registry();
        let mut graph = ExecutionGraph::new();
        graph.insert("1", ExecutionNode::new("CheckpointLoaderSimple"));
        graph.insert(
            "3",
            ExecutionNode::new("KSampler").with_input("model", InputValue::link("1", 3)),
        );

        assert!(registry.validate(&graph).is_ok());
        let err = registry
            .validate_with(&graph, ValidationStrictness::Strict)
            .unwrap_err();
        assert!(err.to_string().contains("3 outputs"));

        graph.get_mut("3").unwrap().inputs["model"] = InputValue::link("1", 2);
        assert!(registry
            .validate_with(&graph, ValidationStrictness::Strict)
            .is_ok());
    }

    // -- Summary ----------------------------------------------------------------

    #[test]
    fn summarize_exhausts_categories_in_order_under_cap() {
        let registry = loaded_registry();
        let summary = registry.summarize(2);
        assert!(summary.contains("CheckpointLoaderSimple"));
        assert!(summary.contains("VAELoader"));
        assert!(!summary.contains("KSampler"));
        assert!(!summary.contains("## samplers"));
    }

    #[test]
    fn summarize_stops_mid_category() {
        let registry = loaded_registry();
        let summary = registry.summarize(1);
        assert!(summary.contains("CheckpointLoaderSimple"));
        assert!(!summary.contains("VAELoader"));
    }

    #[test]
    fn summarize_lists_inputs_and_outputs() {
        let registry = loaded_registry();
        let summary = registry.summarize(10);
        assert!(summary.starts_with("Available nodes (3 total):"));
        assert!(summary.contains("- **KSampler**: Denoises a latent"));
        assert!(summary.contains("Inputs: model(MODEL), seed(INT)"));
        assert!(summary.contains("Outputs: MODEL, CLIP, VAE"));
    }
}
