//! Engine-facing collaborators for `studio-core`.
//!
//! Provides the REST client for schema retrieval and workflow submission,
//! the schema source abstraction, the on-disk registry cache, and the
//! refresh flow that ties them to a [`SchemaRegistry`](studio_core::registry::SchemaRegistry).

pub mod api;
pub mod cache;
pub mod refresh;
pub mod source;
