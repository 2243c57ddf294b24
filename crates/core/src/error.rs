// Error taxonomy for the discovery core

/// Errors surfaced by the discovery core. Callers pattern-match on the
/// variant instead of inspecting message strings.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    /// Malformed or missing required input; never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced identifier does not resolve to a catalog entry.
    #[error("Server not found: {0}")]
    NotFound(String),

    /// The upstream embedding call failed or timed out. Recovered inside
    /// `discover` via textual fallback; propagates everywhere else.
    #[error("embedding generation unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Catalog store or quota store unreachable or erroring.
    #[error("dependency failure: {0}")]
    Dependency(String),

    /// Quota exhausted or invalid credential.
    #[error("rate limited: tier {tier}, {remaining} requests remaining")]
    RateLimited { tier: String, remaining: i64 },
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

impl DiscoveryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound(identifier.into())
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency(message.into())
    }
}
