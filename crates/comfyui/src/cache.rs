//! On-disk copy of the registry, used when the engine is unreachable.

use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;
use studio_core::error::CoreError;

/// Write a cache document, creating parent directories as needed.
pub async fn write_cache_file(path: &Path, document: &Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(document)?;
    tokio::fs::write(path, bytes).await
}

/// Read a cache document.
///
/// A missing file is `NotFound`; unreadable or unparseable contents are
/// `MalformedInput`.
pub async fn read_cache_file(path: &Path) -> Result<Value, CoreError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            CoreError::not_found(format!("Schema cache not found at {}", path.display()))
        }
        _ => CoreError::malformed(format!("Failed to read schema cache: {e}")),
    })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| CoreError::malformed(format!("Schema cache is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[tokio::test]
    async fn written_cache_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("object_info.json");
        let document = json!({ "KSampler": { "category": "sampling", "inputs": [], "outputs": [] } });

        write_cache_file(&path, &document).await.unwrap();
        assert_eq!(read_cache_file(&path).await.unwrap(), document);
    }

    #[tokio::test]
    async fn missing_cache_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_cache_file(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }

    #[tokio::test]
    async fn corrupt_cache_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("object_info.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = read_cache_file(&path).await.unwrap_err();
        assert_matches!(err, CoreError::MalformedInput { .. });
    }
}
