// Recommendation engine: embed -> similarity search -> constraint
// adjustment -> ranking, with result caching and a textual fallback.

use crate::cache::{fingerprint, TtlCache};
use crate::catalog::CatalogStore;
use crate::embeddings::CachedEmbeddings;
use crate::error::{DiscoveryError, Result};
use crate::types::{
    Capability, Constraints, DiscoverInput, DiscoverOutput, MatchedServer, MetricSample,
    RecommendationMetrics, ServerRecommendation,
};
use crate::validation::validate_discover;
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Tunables for ranking and caching. The penalty multipliers and the
/// relevance floor are configuration, not load-bearing constants.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Floor similarity for the vector search
    pub similarity_threshold: f64,
    /// Candidates at or below this adjusted similarity are dropped
    pub relevance_floor: f64,
    /// Multiplier applied when required features are not all present
    pub missing_feature_penalty: f64,
    /// Multiplier applied when latest latency exceeds the constraint
    pub latency_penalty: f64,
    /// Confidence assigned to every textual-fallback hit
    pub fallback_confidence: f64,
    /// Result cache TTL
    pub result_ttl: Duration,
    /// Result cache capacity
    pub result_cache_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            relevance_floor: 0.2,
            missing_feature_penalty: 0.5,
            latency_penalty: 0.7,
            fallback_confidence: 0.5,
            result_ttl: Duration::minutes(5),
            result_cache_size: 500,
        }
    }
}

pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogStore>,
    embeddings: Arc<CachedEmbeddings>,
    results: TtlCache<DiscoverOutput>,
    config: SearchConfig,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>, embeddings: Arc<CachedEmbeddings>) -> Self {
        Self::with_config(catalog, embeddings, SearchConfig::default())
    }

    pub fn with_config(
        catalog: Arc<dyn CatalogStore>,
        embeddings: Arc<CachedEmbeddings>,
        config: SearchConfig,
    ) -> Self {
        Self {
            catalog,
            embeddings,
            results: TtlCache::new(config.result_cache_size, config.result_ttl),
            config,
        }
    }

    /// Find servers matching a natural-language need.
    ///
    /// Embedding failures fall back to a coarse textual match instead of
    /// failing the request; catalog failures propagate.
    pub async fn discover(&self, input: &DiscoverInput) -> Result<DiscoverOutput> {
        let started = Instant::now();
        let limit = validate_discover(input)?;
        let need = input.need.trim();

        let key = fingerprint("search", &(need, &input.constraints, limit));
        if let Some(mut hit) = self.results.get(&key) {
            tracing::debug!("search cache hit");
            hit.cached = true;
            hit.query_time_ms = elapsed_ms(started);
            return Ok(hit);
        }

        let embedding = match self.embeddings.embed(need).await {
            Ok(embedding) => embedding,
            Err(DiscoveryError::EmbeddingUnavailable(reason)) => {
                tracing::warn!("embedding unavailable, using textual fallback: {}", reason);
                return self.fallback_discover(need, limit, started).await;
            }
            Err(err) => return Err(err),
        };

        // Over-fetch to leave room for post-filtering without another
        // round trip to the store
        let candidates = self
            .catalog
            .search_by_similarity(&embedding, limit * 2, self.config.similarity_threshold)
            .await?;

        let constraints = input.constraints.clone().unwrap_or_default();
        let candidates = apply_exclusions(candidates, &constraints);

        // Tags and metrics are independent collaborator calls; enrich
        // candidates concurrently
        let enriched = futures::future::try_join_all(candidates.into_iter().map(|candidate| {
            let catalog = Arc::clone(&self.catalog);
            async move {
                let (capabilities, metric) = tokio::try_join!(
                    catalog.capabilities_for(candidate.id),
                    catalog.latest_metric(candidate.id),
                )?;
                Ok::<_, DiscoveryError>((candidate, capabilities, metric))
            }
        }))
        .await?;

        let mut recommendations: Vec<ServerRecommendation> = enriched
            .into_iter()
            .map(|(candidate, capabilities, metric)| {
                let adjusted = self.adjust_similarity(
                    candidate.similarity,
                    &capabilities,
                    metric.as_ref(),
                    &constraints,
                );
                build_recommendation(candidate, capabilities, metric, round2(adjusted))
            })
            .filter(|rec| rec.confidence > self.config.relevance_floor)
            .collect();

        // Stable sort: equal confidences keep encounter order
        recommendations.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations.truncate(limit);

        let output = DiscoverOutput {
            total_found: recommendations.len(),
            recommendations,
            query_time_ms: elapsed_ms(started),
            cached: false,
            fallback: false,
        };

        self.results.insert(key, output.clone());
        Ok(output)
    }

    /// Constraint penalties adjust similarity downward instead of hard
    /// exclusion so ranking stays graceful under imperfect metadata
    fn adjust_similarity(
        &self,
        similarity: f64,
        capabilities: &[Capability],
        metric: Option<&MetricSample>,
        constraints: &Constraints,
    ) -> f64 {
        let mut adjusted = similarity;

        if let Some(required) = &constraints.required_features {
            if !required.is_empty() {
                let has_all = required
                    .iter()
                    .all(|feature| capabilities.iter().any(|cap| overlaps(&cap.name, feature)));
                if !has_all {
                    adjusted *= self.config.missing_feature_penalty;
                }
            }
        }

        if let (Some(max_latency), Some(latency)) = (
            constraints.max_latency_ms,
            metric.and_then(|m| m.latency_ms),
        ) {
            if latency > max_latency {
                adjusted *= self.config.latency_penalty;
            }
        }

        adjusted
    }

    /// Coarse substring match over name/description when embedding
    /// generation is down. Never consults or updates the result cache.
    async fn fallback_discover(
        &self,
        need: &str,
        limit: usize,
        started: Instant,
    ) -> Result<DiscoverOutput> {
        let hits = self.catalog.search_by_text(need, limit).await?;
        let confidence = round2(self.config.fallback_confidence);

        let recommendations: Vec<ServerRecommendation> = hits
            .into_iter()
            .map(|entry| ServerRecommendation {
                server: entry.slug,
                npm_package: entry.npm_package,
                install_command: entry.install_command,
                confidence,
                description: entry.description,
                capabilities: Vec::new(),
                metrics: RecommendationMetrics {
                    avg_latency_ms: None,
                    uptime_pct: None,
                    last_checked: None,
                },
                docs_url: entry.docs_url,
                github_url: entry.github_url,
                routing_reason: None,
            })
            .collect();

        Ok(DiscoverOutput {
            total_found: recommendations.len(),
            recommendations,
            query_time_ms: elapsed_ms(started),
            cached: false,
            fallback: true,
        })
    }

    /// Drop expired entries from the result and embedding caches.
    /// Scheduled by the process entrypoint, not a hidden timer.
    pub fn prune_caches(&self) -> usize {
        self.results.prune() + self.embeddings.prune()
    }
}

fn apply_exclusions(candidates: Vec<MatchedServer>, constraints: &Constraints) -> Vec<MatchedServer> {
    let Some(excluded) = &constraints.exclude_servers else {
        return candidates;
    };
    if excluded.is_empty() {
        return candidates;
    }

    let excluded: HashSet<String> = excluded.iter().map(|s| s.to_lowercase()).collect();
    candidates
        .into_iter()
        .filter(|candidate| {
            !excluded.contains(&candidate.slug.to_lowercase())
                && !excluded.contains(&candidate.id.to_string().to_lowercase())
        })
        .collect()
}

/// Case-insensitive substring match in either direction
fn overlaps(capability: &str, feature: &str) -> bool {
    let capability = capability.to_lowercase();
    let feature = feature.to_lowercase();
    capability.contains(&feature) || feature.contains(&capability)
}

fn build_recommendation(
    candidate: MatchedServer,
    capabilities: Vec<Capability>,
    metric: Option<MetricSample>,
    confidence: f64,
) -> ServerRecommendation {
    ServerRecommendation {
        server: candidate.slug,
        npm_package: candidate.npm_package,
        install_command: candidate.install_command,
        confidence,
        description: candidate.description,
        capabilities: capabilities.into_iter().map(|c| c.name).collect(),
        metrics: RecommendationMetrics {
            avg_latency_ms: metric.as_ref().and_then(|m| m.latency_ms),
            uptime_pct: metric.as_ref().and_then(|m| m.uptime_pct),
            last_checked: metric.as_ref().map(|m| m.timestamp),
        },
        docs_url: candidate.docs_url,
        github_url: candidate.github_url,
        routing_reason: candidate.routing_reason,
    }
}

/// Round to two decimal places for display
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::{entry, sample};
    use crate::catalog::InMemoryCatalog;
    use crate::embeddings::{DisabledEmbeddings, EmbeddingProvider};
    use chrono::Utc;
    use std::collections::HashMap;

    /// Deterministic provider keyed by exact query text
    struct MapProvider {
        vectors: HashMap<String, Vec<f32>>,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for MapProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.vectors.get(text).cloned().ok_or_else(|| {
                DiscoveryError::EmbeddingUnavailable(format!("no vector for '{}'", text))
            })
        }
    }

    fn engine_with(
        catalog: Arc<InMemoryCatalog>,
        vectors: &[(&str, Vec<f32>)],
    ) -> RecommendationEngine {
        let provider = MapProvider {
            vectors: vectors
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        };
        RecommendationEngine::new(
            catalog,
            Arc::new(CachedEmbeddings::new(Arc::new(provider))),
        )
    }

    fn discover_input(need: &str) -> DiscoverInput {
        DiscoverInput {
            need: need.to_string(),
            constraints: None,
            limit: None,
        }
    }

    #[tokio::test]
    async fn test_scenario_database_query_ranks_postgres_first() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let pg = catalog.insert_entry(entry(
            "postgres-mcp",
            "PostgreSQL database access with auth",
            Some(vec![1.0, 0.0, 0.0]),
        ));
        catalog.add_capability(pg, "database", None);
        catalog.add_capability(pg, "auth", None);
        catalog.insert_entry(entry(
            "image-gen-mcp",
            "generate images from prompts",
            Some(vec![0.0, 1.0, 0.0]),
        ));

        let engine = engine_with(
            catalog,
            &[("database with authentication", vec![0.98, 0.05, 0.0])],
        );
        let output = engine
            .discover(&discover_input("database with authentication"))
            .await
            .unwrap();

        assert_eq!(output.total_found, output.recommendations.len());
        assert_eq!(output.recommendations[0].server, "postgres-mcp");
        assert!(output.recommendations[0].confidence > 0.3);
        assert!(!output
            .recommendations
            .iter()
            .any(|r| r.server == "image-gen-mcp"));
    }

    #[tokio::test]
    async fn test_confidence_bounds_and_ordering() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert_entry(entry("close", "c", Some(vec![1.0, 0.0, 0.0])));
        catalog.insert_entry(entry("middle", "m", Some(vec![0.6, 0.8, 0.0])));
        catalog.insert_entry(entry("far", "f", Some(vec![0.15, 0.988, 0.0])));

        let engine = engine_with(catalog, &[("query", vec![1.0, 0.0, 0.0])]);
        let output = engine.discover(&discover_input("query")).await.unwrap();

        assert_eq!(output.total_found, output.recommendations.len());
        for pair in output.recommendations.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for rec in &output.recommendations {
            assert!(rec.confidence > 0.2 && rec.confidence <= 1.0);
            assert_eq!(rec.confidence, round2(rec.confidence));
        }
    }

    #[tokio::test]
    async fn test_latency_penalty_is_exactly_point_seven() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let fast = catalog.insert_entry(entry("fast", "identical", Some(vec![1.0, 0.0, 0.0])));
        let slow = catalog.insert_entry(entry("slow", "identical", Some(vec![1.0, 0.0, 0.0])));
        catalog.record_metric(sample(fast, Utc::now(), Some(100.0), Some(99.9)));
        catalog.record_metric(sample(slow, Utc::now(), Some(500.0), Some(99.9)));

        let engine = engine_with(catalog, &[("query", vec![1.0, 0.0, 0.0])]);
        let input = DiscoverInput {
            need: "query".to_string(),
            constraints: Some(Constraints {
                max_latency_ms: Some(200.0),
                ..Default::default()
            }),
            limit: None,
        };
        let output = engine.discover(&input).await.unwrap();

        let fast_rec = output
            .recommendations
            .iter()
            .find(|r| r.server == "fast")
            .unwrap();
        let slow_rec = output
            .recommendations
            .iter()
            .find(|r| r.server == "slow")
            .unwrap();
        assert!((slow_rec.confidence - round2(fast_rec.confidence * 0.7)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_required_feature_halves_confidence() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let with_auth = catalog.insert_entry(entry("with-auth", "x", Some(vec![1.0, 0.0, 0.0])));
        let without = catalog.insert_entry(entry("without", "x", Some(vec![1.0, 0.0, 0.0])));
        catalog.add_capability(with_auth, "authentication", None);
        catalog.add_capability(without, "email", None);

        let engine = engine_with(catalog, &[("query", vec![1.0, 0.0, 0.0])]);
        let input = DiscoverInput {
            need: "query".to_string(),
            constraints: Some(Constraints {
                required_features: Some(vec!["auth".to_string()]),
                ..Default::default()
            }),
            limit: None,
        };
        let output = engine.discover(&input).await.unwrap();

        // "auth" is a substring of "authentication", so the overlap holds
        let matched = output
            .recommendations
            .iter()
            .find(|r| r.server == "with-auth")
            .unwrap();
        let penalized = output
            .recommendations
            .iter()
            .find(|r| r.server == "without")
            .unwrap();
        assert_eq!(matched.confidence, 1.0);
        assert_eq!(penalized.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_excluded_servers_are_filtered() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert_entry(entry("keep-me", "x", Some(vec![1.0, 0.0, 0.0])));
        catalog.insert_entry(entry("drop-me", "x", Some(vec![1.0, 0.0, 0.0])));

        let engine = engine_with(catalog, &[("query", vec![1.0, 0.0, 0.0])]);
        let input = DiscoverInput {
            need: "query".to_string(),
            constraints: Some(Constraints {
                exclude_servers: Some(vec!["Drop-Me".to_string()]),
                ..Default::default()
            }),
            limit: None,
        };
        let output = engine.discover(&input).await.unwrap();

        assert_eq!(output.recommendations.len(), 1);
        assert_eq!(output.recommendations[0].server, "keep-me");
    }

    #[tokio::test]
    async fn test_second_identical_call_is_served_from_cache() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert_entry(entry("a", "x", Some(vec![1.0, 0.0, 0.0])));

        let engine = engine_with(catalog, &[("query", vec![1.0, 0.0, 0.0])]);
        let first = engine.discover(&discover_input("query")).await.unwrap();
        let second = engine.discover(&discover_input("query")).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.recommendations, second.recommendations);
    }

    #[tokio::test]
    async fn test_fallback_on_embedding_failure() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert_entry(entry("postgres-mcp", "PostgreSQL database access", None));
        catalog.insert_entry(entry("email-mcp", "send transactional email", None));

        let engine = RecommendationEngine::new(
            catalog,
            Arc::new(CachedEmbeddings::new(Arc::new(DisabledEmbeddings))),
        );
        let output = engine.discover(&discover_input("database")).await.unwrap();

        assert!(output.fallback);
        assert_eq!(output.recommendations.len(), 1);
        assert_eq!(output.recommendations[0].server, "postgres-mcp");
        for rec in &output.recommendations {
            assert_eq!(rec.confidence, 0.5);
        }

        // Fallback never touches the cache
        let again = engine.discover(&discover_input("database")).await.unwrap();
        assert!(again.fallback);
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn test_validation_failure_before_any_lookup() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let engine = engine_with(catalog, &[]);

        let err = engine.discover(&discover_input("")).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Validation(_)));
    }

    #[test]
    fn test_overlap_is_bidirectional_and_case_insensitive() {
        assert!(overlaps("authentication", "auth"));
        assert!(overlaps("auth", "Authentication"));
        assert!(!overlaps("email", "database"));
    }
}
