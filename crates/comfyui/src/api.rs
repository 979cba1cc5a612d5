//! REST client for the engine's schema and submission endpoints.
//!
//! Wraps `GET /object_info`, `GET /object_info/{class}` and `POST /prompt`
//! using [`reqwest`].

use serde::Deserialize;
use serde_json::Value;
use studio_core::graph::ExecutionGraph;

/// HTTP client for a single engine instance.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by `/prompt` after a workflow is queued.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    pub number: i32,
    /// Per-node errors the engine reported while accepting the prompt.
    #[serde(default)]
    pub node_errors: Value,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Fresh client id for a submission session.
pub fn new_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Body of a `POST /prompt` request.
pub fn prompt_request_body(graph: &ExecutionGraph, client_id: &str) -> Value {
    serde_json::json!({
        "prompt": graph.to_json(),
        "client_id": client_id,
    })
}

impl ComfyUIApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Fetch the full node class schema (`GET /object_info`).
    pub async fn get_object_info(&self) -> Result<Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/object_info", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the schema of a single class (`GET /object_info/{class}`).
    ///
    /// The engine answers with a one-entry document keyed by class name.
    pub async fn get_object_info_for(&self, class_name: &str) -> Result<Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/object_info/{}", self.api_url, class_name))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Queue a workflow for execution.
    pub async fn submit_workflow(
        &self,
        graph: &ExecutionGraph,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&prompt_request_body(graph, client_id))
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::info!(
            prompt_id = %submitted.prompt_id,
            queue_position = submitted.number,
            node_count = graph.len(),
            "Workflow queued",
        );
        Ok(submitted)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`ComfyUIApiError::ApiError`] carrying the status and body.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use studio_core::graph::{ExecutionNode, InputValue};

    #[test]
    fn prompt_body_wraps_graph_and_client_id() {
        let mut graph = ExecutionGraph::new();
        graph.insert("1", ExecutionNode::new("CheckpointLoaderSimple"));
        graph.insert(
            "2",
            ExecutionNode::new("CLIPTextEncode")
                .with_input("text", InputValue::Literal(json!("cat")))
                .with_input("clip", InputValue::link("1", 1)),
        );

        let body = prompt_request_body(&graph, "client-a");
        assert_eq!(body["client_id"], "client-a");
        assert_eq!(body["prompt"]["2"]["inputs"]["clip"], json!(["1", 1]));
        assert_eq!(body["prompt"]["1"]["class_type"], "CheckpointLoaderSimple");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = ComfyUIApi::new("http://localhost:8188/".to_string());
        assert_eq!(api.api_url(), "http://localhost:8188");
    }

    #[test]
    fn client_ids_are_unique() {
        let a = new_client_id();
        let b = new_client_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn submit_response_tolerates_missing_node_errors() {
        let parsed: SubmitResponse =
            serde_json::from_value(json!({"prompt_id": "abc", "number": 3})).unwrap();
        assert_eq!(parsed.prompt_id, "abc");
        assert!(parsed.node_errors.is_null());
    }
}
