use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub Uuid);

impl ServerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A caller-supplied server reference, resolved once at the boundary.
///
/// UUID-shaped strings address entries by internal id, everything else is
/// treated as a slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Id(ServerId),
    Slug(String),
}

impl Identifier {
    pub fn parse(raw: &str) -> Self {
        match Uuid::parse_str(raw) {
            Ok(uuid) => Self::Id(ServerId(uuid)),
            Err(_) => Self::Slug(raw.to_string()),
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Slug(slug) => write!(f, "{}", slug),
        }
    }
}

/// Embedding dimensionality used across the catalog
pub const EMBEDDING_DIM: usize = 1536;

/// A discoverable MCP server record.
///
/// Created by ingestion and mutated only by catalog maintenance; the core
/// treats entries as read-only. `description_embedding` is populated lazily
/// by a backfill process and may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: ServerId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub npm_package: Option<String>,
    pub install_command: String,
    pub docs_url: Option<String>,
    pub github_url: Option<String>,
    pub homepage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_embedding: Option<Vec<f32>>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named feature label, many-to-many with catalog entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// One timestamped performance observation for a catalog entry.
/// Samples are append-only; "current" means the most recent sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub server_id: ServerId,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub success_rate: Option<f64>,
    pub uptime_pct: Option<f64>,
    pub error_count: u32,
    pub active_connections: u32,
}

/// A catalog entry matched by similarity search. Ephemeral, never persisted.
///
/// `similarity` starts as the cosine similarity to the query embedding and
/// is only ever adjusted downward by constraint penalties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedServer {
    pub id: ServerId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub npm_package: Option<String>,
    pub install_command: String,
    pub docs_url: Option<String>,
    pub github_url: Option<String>,
    pub is_verified: bool,
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_reason: Option<String>,
}

impl MatchedServer {
    pub fn from_entry(entry: &CatalogEntry, similarity: f64) -> Self {
        Self {
            id: entry.id,
            slug: entry.slug.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            category: entry.category.clone(),
            npm_package: entry.npm_package.clone(),
            install_command: entry.install_command.clone(),
            docs_url: entry.docs_url.clone(),
            github_url: entry.github_url.clone(),
            is_verified: entry.is_verified,
            similarity,
            routing_reason: None,
        }
    }
}

// === discover_mcp_server ===

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_servers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverInput {
    pub need: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMetrics {
    pub avg_latency_ms: Option<f64>,
    pub uptime_pct: Option<f64>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecommendation {
    /// Slug of the recommended server
    pub server: String,
    pub npm_package: Option<String>,
    pub install_command: String,
    /// Adjusted similarity in (0.2, 1.0], rounded to two decimals
    pub confidence: f64,
    pub description: Option<String>,
    pub capabilities: Vec<String>,
    pub metrics: RecommendationMetrics,
    pub docs_url: Option<String>,
    pub github_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverOutput {
    pub recommendations: Vec<ServerRecommendation>,
    pub total_found: usize,
    pub query_time_ms: u64,
    /// Set when the response was served from the result cache
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
    /// Set when embedding generation failed and textual matching was used
    #[serde(default, skip_serializing_if = "is_false")]
    pub fallback: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

// === get_server_metrics ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    Hour,
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeRange {
    pub fn hours(&self) -> i64 {
        match self {
            Self::Hour => 1,
            Self::Day => 24,
            Self::Week => 168,
            Self::Month => 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMetricsInput {
    pub server_id: String,
    #[serde(default)]
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: ServerId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMetrics {
    pub latency_ms: Option<f64>,
    pub success_rate: Option<f64>,
    pub uptime_pct: Option<f64>,
    pub active_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsHistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub success_rate: Option<f64>,
    pub uptime_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub current: CurrentMetrics,
    pub history: Vec<MetricsHistoryPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMetricsOutput {
    pub server: ServerSummary,
    pub metrics: MetricsReport,
}

// === compare_servers ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareDimension {
    Latency,
    Uptime,
    Features,
}

impl CompareDimension {
    pub fn all() -> Vec<Self> {
        vec![Self::Latency, Self::Uptime, Self::Features]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareInput {
    pub server_ids: Vec<String>,
    #[serde(default = "CompareDimension::all")]
    pub compare_by: Vec<CompareDimension>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub latency_ms: Option<f64>,
    pub uptime_pct: Option<f64>,
    pub success_rate: Option<f64>,
}

/// 1-based ranks per dimension; 0 means unranked (missing metric) or the
/// dimension was not requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub by_latency: u32,
    pub by_uptime: u32,
    pub by_features: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerComparison {
    pub id: ServerId,
    pub name: String,
    pub slug: String,
    pub capabilities: Vec<String>,
    pub metrics: ComparisonMetrics,
    pub ranking: Ranking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareOutput {
    pub servers: Vec<ServerComparison>,
}

// === Rate limiting / usage metering ===

/// Quota class governing request budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Free,
    Pro,
    Enterprise,
    /// Credential did not resolve to any record
    Invalid,
    /// Quota store errored; request allowed fail-open
    Error,
}

impl Tier {
    /// Monthly request budget for issued-credential tiers
    pub fn monthly_limit(&self) -> Option<u32> {
        match self {
            Self::Free => Some(100),
            Self::Pro => Some(10_000),
            Self::Enterprise => Some(999_999),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Public => "public",
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
            Self::Invalid => "invalid",
            Self::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: i64,
    pub tier: Tier,
    pub credential_id: Option<Uuid>,
}

/// One usage event, appended fire-and-forget after a request completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub credential_id: Uuid,
    pub endpoint: String,
    pub query: String,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}
