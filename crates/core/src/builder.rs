//! Turn a raw model response into an executable workflow.
//!
//! Pipeline: extract embedded JSON → detect the format → convert editor
//! graphs to the execution format → shape validation → auto-fix. The result
//! is accepted or rejected with a short reason; registry validation is a
//! separate, optional step because the registry may not be loaded yet when
//! a response arrives.

use serde::Serialize;
use serde_json::Value;

use crate::autofix::auto_fix;
use crate::config::PipelineConfig;
use crate::converter::{editor_to_execution, execution_to_editor, validate_execution_shape};
use crate::editor::EditorGraph;
use crate::error::CoreError;
use crate::extract::extract_embedded_json;
use crate::graph::ExecutionGraph;
use crate::registry::SchemaRegistry;

/// Which of the two workflow formats a document is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowFormat {
    /// Flat `{node_id: {class_type, inputs}}` object.
    Execution,
    /// `{nodes, links}` editor document.
    Editor,
}

impl WorkflowFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Editor => "editor",
        }
    }
}

impl std::fmt::Display for WorkflowFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accepted workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltWorkflow {
    pub graph: ExecutionGraph,
    pub node_count: usize,
    /// Format the model wrote the workflow in.
    pub source_format: WorkflowFormat,
}

/// Decide whether a document is an execution or editor workflow.
///
/// Execution format requires every top-level entry to be an object with a
/// `class_type` key. Otherwise a `nodes` key marks the editor format.
pub fn detect_format(document: &Value) -> Result<WorkflowFormat, CoreError> {
    let Some(obj) = document.as_object() else {
        return Err(CoreError::AmbiguousFormat(
            "JSON is not a recognized workflow shape".to_string(),
        ));
    };

    let all_nodes = !obj.is_empty() && obj.values().all(|v| v.get("class_type").is_some());
    if all_nodes {
        Ok(WorkflowFormat::Execution)
    } else if obj.contains_key("nodes") {
        Ok(WorkflowFormat::Editor)
    } else {
        Err(CoreError::AmbiguousFormat(
            "JSON is not a recognized workflow shape".to_string(),
        ))
    }
}

/// Pretty-printed execution JSON for display.
pub fn format_workflow(graph: &ExecutionGraph) -> String {
    serde_json::to_string_pretty(&graph.to_json()).unwrap_or_default()
}

/// Builds execution graphs from model responses under one configuration.
#[derive(Debug, Clone, Default)]
pub struct WorkflowBuilder {
    config: PipelineConfig,
}

impl WorkflowBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline over a raw model response.
    pub fn build(&self, response: &str) -> Result<BuiltWorkflow, CoreError> {
        let result = self.build_inner(response);
        match &result {
            Ok(built) => tracing::info!(
                node_count = built.node_count,
                source_format = %built.source_format,
                "Accepted generated workflow"
            ),
            Err(e) => tracing::info!(reason = %e, "Rejected generated workflow"),
        }
        result
    }

    fn build_inner(&self, response: &str) -> Result<BuiltWorkflow, CoreError> {
        let document = extract_embedded_json(response)?;
        if document.is_null() || document.as_object().is_some_and(|o| o.is_empty()) {
            return Err(CoreError::malformed("No JSON found in response"));
        }

        let source_format = detect_format(&document)?;
        let normalized = match source_format {
            WorkflowFormat::Execution => document,
            WorkflowFormat::Editor => {
                let editor = EditorGraph::from_json(&document)?;
                editor_to_execution(&editor).to_json()
            }
        };

        validate_execution_shape(&normalized)?;
        let graph = ExecutionGraph::from_json(&normalized)?;
        let graph = auto_fix(&graph, &self.config.aliases);

        Ok(BuiltWorkflow {
            node_count: graph.len(),
            graph,
            source_format,
        })
    }

    /// Stricter follow-up check against a loaded registry.
    pub fn validate_against_registry(
        &self,
        graph: &ExecutionGraph,
        registry: &SchemaRegistry,
    ) -> Result<(), CoreError> {
        registry.validate_with(graph, self.config.strictness)
    }

    /// Convert an accepted graph for display in the graph editor.
    pub fn to_editor(&self, graph: &ExecutionGraph) -> Result<EditorGraph, CoreError> {
        execution_to_editor(graph, &self.config.layout)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
