// Catalog store contract and in-memory reference implementation

use crate::error::Result;
use crate::types::{
    CatalogEntry, Capability, Identifier, MatchedServer, MetricSample, ServerId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Read contract over the server catalog.
///
/// Implementations own persistence and the vector index; the core never
/// reimplements nearest-neighbor search.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Resolve an entry by internal id or slug
    async fn get_by_identifier(&self, identifier: &Identifier) -> Result<Option<CatalogEntry>>;

    /// Entries whose embedding similarity to `query` exceeds `threshold`,
    /// ordered descending by similarity, truncated to `limit`
    async fn search_by_similarity(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<MatchedServer>>;

    /// Capability tags attached to an entry
    async fn capabilities_for(&self, server: ServerId) -> Result<Vec<Capability>>;

    /// Most recent metric sample for an entry, if any
    async fn latest_metric(&self, server: ServerId) -> Result<Option<MetricSample>>;

    /// Metric samples since a timestamp, ascending by time
    async fn metric_history(
        &self,
        server: ServerId,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>>;

    /// Case-insensitive substring match over name and description,
    /// used by the non-semantic fallback
    async fn search_by_text(&self, needle: &str, limit: usize) -> Result<Vec<CatalogEntry>>;

    /// List entries, optionally filtered to one category
    async fn list_servers(&self, category: Option<&str>, limit: usize)
        -> Result<Vec<CatalogEntry>>;

    /// Distinct categories with entry counts, most populous first
    async fn categories(&self) -> Result<Vec<(String, usize)>>;

    /// Total number of catalog entries
    async fn count(&self) -> Result<usize>;
}

/// Cosine similarity clamped to [0, 1]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// In-process catalog used by tests and the standalone binaries.
///
/// Slugs are globally unique; inserting an entry with an existing slug
/// replaces it. Metric samples are append-only.
pub struct InMemoryCatalog {
    servers: Mutex<HashMap<ServerId, CatalogEntry>>,
    slugs: Mutex<HashMap<String, ServerId>>,
    capabilities: Mutex<HashMap<ServerId, Vec<Capability>>>,
    metrics: Mutex<HashMap<ServerId, Vec<MetricSample>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
            slugs: Mutex::new(HashMap::new()),
            capabilities: Mutex::new(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert_entry(&self, entry: CatalogEntry) -> ServerId {
        let mut servers = self.servers.lock().unwrap();
        let mut slugs = self.slugs.lock().unwrap();

        // Upsert on slug so it stays the stable external identifier; the
        // replaced id takes its capability and metric rows with it
        if let Some(existing) = slugs.get(&entry.slug) {
            let existing = *existing;
            servers.remove(&existing);
            self.capabilities.lock().unwrap().remove(&existing);
            self.metrics.lock().unwrap().remove(&existing);
        }

        let id = entry.id;
        slugs.insert(entry.slug.clone(), id);
        servers.insert(id, entry);
        id
    }

    pub fn add_capability(&self, server: ServerId, name: &str, category: Option<&str>) {
        let mut capabilities = self.capabilities.lock().unwrap();
        let tags = capabilities.entry(server).or_default();

        // A (entry, tag) pair appears at most once
        if tags.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return;
        }

        tags.push(Capability {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: category.map(|c| c.to_string()),
            description: None,
        });
    }

    pub fn record_metric(&self, sample: MetricSample) {
        self.metrics
            .lock()
            .unwrap()
            .entry(sample.server_id)
            .or_default()
            .push(sample);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_by_identifier(&self, identifier: &Identifier) -> Result<Option<CatalogEntry>> {
        let servers = self.servers.lock().unwrap();
        let entry = match identifier {
            Identifier::Id(id) => servers.get(id).cloned(),
            Identifier::Slug(slug) => {
                let slugs = self.slugs.lock().unwrap();
                slugs.get(slug).and_then(|id| servers.get(id)).cloned()
            }
        };
        Ok(entry)
    }

    async fn search_by_similarity(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<MatchedServer>> {
        let servers = self.servers.lock().unwrap();

        let mut matches: Vec<MatchedServer> = servers
            .values()
            .filter_map(|entry| {
                let embedding = entry.description_embedding.as_ref()?;
                let similarity = cosine_similarity(query, embedding);
                (similarity > threshold).then(|| MatchedServer::from_entry(entry, similarity))
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn capabilities_for(&self, server: ServerId) -> Result<Vec<Capability>> {
        Ok(self
            .capabilities
            .lock()
            .unwrap()
            .get(&server)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_metric(&self, server: ServerId) -> Result<Option<MetricSample>> {
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .get(&server)
            .and_then(|samples| samples.iter().max_by_key(|s| s.timestamp).cloned()))
    }

    async fn metric_history(
        &self,
        server: ServerId,
        since: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>> {
        let mut history: Vec<MetricSample> = self
            .metrics
            .lock()
            .unwrap()
            .get(&server)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        history.sort_by_key(|s| s.timestamp);
        Ok(history)
    }

    async fn search_by_text(&self, needle: &str, limit: usize) -> Result<Vec<CatalogEntry>> {
        let needle = needle.to_lowercase();
        let servers = self.servers.lock().unwrap();

        let mut hits: Vec<CatalogEntry> = servers
            .values()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&needle)
                    || entry
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        hits.sort_by(|a, b| a.name.cmp(&b.name));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_servers(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CatalogEntry>> {
        let servers = self.servers.lock().unwrap();

        let mut listed: Vec<CatalogEntry> = servers
            .values()
            .filter(|entry| match category {
                Some(wanted) => entry.category.as_deref() == Some(wanted),
                None => true,
            })
            .cloned()
            .collect();

        listed.sort_by(|a, b| a.name.cmp(&b.name));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn categories(&self) -> Result<Vec<(String, usize)>> {
        let servers = self.servers.lock().unwrap();
        let mut counts: HashMap<String, usize> = HashMap::new();

        for entry in servers.values() {
            if let Some(category) = &entry.category {
                *counts.entry(category.clone()).or_default() += 1;
            }
        }

        let mut categories: Vec<(String, usize)> = counts.into_iter().collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(categories)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.servers.lock().unwrap().len())
    }
}
