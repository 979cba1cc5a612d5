//! Where the node class schema comes from.

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ComfyUIApi, ComfyUIApiError};

/// Anything that can produce an `/object_info`-shaped schema document.
///
/// Implemented by [`ComfyUIApi`]; tests substitute an in-memory source.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_schema(&self) -> Result<Value, ComfyUIApiError>;
}

#[async_trait]
impl SchemaSource for ComfyUIApi {
    async fn fetch_schema(&self) -> Result<Value, ComfyUIApiError> {
        self.get_object_info().await
    }
}
