//! Keep the schema registry populated from the engine, or from the local
//! cache when the engine cannot be reached.
//!
//! A successful engine load refreshes the cache file. Any engine failure
//! (request, status, or an unusable document) falls back to the cache.

use std::path::Path;

use studio_core::error::CoreError;
use studio_core::registry::SchemaRegistry;

use crate::cache::{read_cache_file, write_cache_file};
use crate::source::SchemaSource;

/// Where the registry's current contents came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrySource {
    Engine,
    Cache,
}

impl RegistrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::Cache => "cache",
        }
    }
}

impl std::fmt::Display for RegistrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Neither the engine nor the cache produced a usable schema.
#[derive(Debug, thiserror::Error)]
#[error("Node schema unavailable: engine: {engine}; cache: {cache}")]
pub struct RefreshError {
    /// Why the engine load failed.
    pub engine: String,
    /// Why the cache load failed.
    #[source]
    pub cache: CoreError,
}

/// Load the registry from `source`, falling back to the cache at
/// `cache_path`.
///
/// On failure the registry keeps whatever it held before the call.
pub async fn refresh_registry<S>(
    registry: &SchemaRegistry,
    source: &S,
    cache_path: &Path,
) -> Result<RegistrySource, RefreshError>
where
    S: SchemaSource + ?Sized,
{
    let engine_error = match source.fetch_schema().await {
        Ok(document) => match registry.load_from_source(&document) {
            Ok(_) => {
                if let Err(e) = write_cache_file(cache_path, &registry.to_cache_document()).await {
                    tracing::warn!(
                        path = %cache_path.display(),
                        error = %e,
                        "Failed to write schema cache",
                    );
                }
                return Ok(RegistrySource::Engine);
            }
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        error = %engine_error,
        path = %cache_path.display(),
        "Engine schema unavailable, falling back to cache",
    );

    let load_cache = async {
        let document = read_cache_file(cache_path).await?;
        registry.load_from_cache(&document)
    };
    match load_cache.await {
        Ok(_) => Ok(RegistrySource::Cache),
        Err(cache) => Err(RefreshError {
            engine: engine_error,
            cache,
        }),
    }
}
