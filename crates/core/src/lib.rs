//! Workflow graph translation and validation.
//!
//! Takes the free-form output of a language model, pulls out the embedded
//! workflow JSON, normalizes it into the execution format the engine runs,
//! and checks it against a registry of known node classes. Also converts
//! between the execution and editor formats.
//!
//! This crate has no I/O; fetching the schema and talking to the engine
//! live in `studio-comfyui`.

pub mod autofix;
pub mod builder;
pub mod config;
pub mod converter;
pub mod editor;
pub mod error;
pub mod extract;
pub mod graph;
pub mod registry;
pub mod schema;

pub use builder::{BuiltWorkflow, WorkflowBuilder, WorkflowFormat};
pub use error::CoreError;
pub use graph::{ExecutionGraph, ExecutionNode, InputValue};
pub use registry::SchemaRegistry;
