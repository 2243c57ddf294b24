// Embedding provider adapter with response caching

use crate::cache::{fingerprint, TtlCache};
use crate::error::{DiscoveryError, Result};
use crate::types::EMBEDDING_DIM;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Upper bound on a single embedding call; a slow upstream must never
/// block the request pipeline indefinitely.
pub const EMBED_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(8);

const EMBEDDING_CACHE_SIZE: usize = 200;
const EMBEDDING_CACHE_TTL_MINUTES: i64 = 60;

/// Remote embedding-generation contract
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into a fixed-dimension vector. All upstream failures
    /// surface as `EmbeddingUnavailable`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// OpenAI embeddings API adapter
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("scout/0.1.0")
            .timeout(EMBED_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::dependency(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: "text-embedding-3-small".to_string(),
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
        })
    }

    /// Build from `OPENAI_API_KEY`, if set
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Some(Self::new(key)?)),
            _ => Ok(None),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text.trim(),
            dimensions: EMBEDDING_DIM,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::EmbeddingUnavailable("upstream timeout".to_string())
                } else {
                    DiscoveryError::EmbeddingUnavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::EmbeddingUnavailable(format!(
                "upstream returned {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::EmbeddingUnavailable(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DiscoveryError::EmbeddingUnavailable("empty response".to_string()))
    }
}

/// Provider for deployments without embedding credentials; every call
/// reports unavailable so the engine takes its textual fallback.
pub struct DisabledEmbeddings;

#[async_trait::async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(DiscoveryError::EmbeddingUnavailable(
            "no embedding provider configured".to_string(),
        ))
    }
}

/// Caching wrapper around any embedding provider.
///
/// Results are keyed by the trimmed input text with a long TTL, since the
/// same query text repeats across callers. The wrapper also enforces the
/// 8-second ceiling independent of the underlying provider.
pub struct CachedEmbeddings {
    inner: Arc<dyn EmbeddingProvider>,
    cache: TtlCache<Vec<f32>>,
}

impl CachedEmbeddings {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            cache: TtlCache::new(
                EMBEDDING_CACHE_SIZE,
                Duration::minutes(EMBEDDING_CACHE_TTL_MINUTES),
            ),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        let key = fingerprint("emb", &trimmed);

        if let Some(embedding) = self.cache.get(&key) {
            tracing::debug!("embedding cache hit");
            return Ok(embedding);
        }

        let embedding = match tokio::time::timeout(EMBED_TIMEOUT, self.inner.embed(trimmed)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(DiscoveryError::EmbeddingUnavailable(
                    "embedding call exceeded 8s".to_string(),
                ))
            }
        };

        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    pub fn prune(&self) -> usize {
        self.cache.prune()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let seed = text.len() as f32;
            Ok(vec![seed, 1.0, 0.0])
        }
    }

    #[tokio::test]
    async fn test_repeated_queries_hit_cache() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbeddings::new(provider.clone());

        let first = cached.embed("database with auth").await.unwrap();
        let second = cached.embed("database with auth").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_whitespace_does_not_change_cache_identity() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedEmbeddings::new(provider.clone());

        cached.embed("send emails").await.unwrap();
        cached.embed("  send emails  ").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_provider_reports_unavailable() {
        let cached = CachedEmbeddings::new(Arc::new(DisabledEmbeddings));
        let err = cached.embed("anything").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::EmbeddingUnavailable(_)));
        assert_eq!(cached.cached_count(), 0);
    }
}
