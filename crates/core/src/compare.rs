// Side-by-side comparison with independent per-dimension rankings

use crate::catalog::CatalogStore;
use crate::error::{DiscoveryError, Result};
use crate::types::{
    CompareDimension, CompareInput, CompareOutput, ComparisonMetrics, Identifier, Ranking,
    ServerComparison,
};
use crate::validation::validate_compare;
use std::sync::Arc;

pub struct ComparisonEngine {
    catalog: Arc<dyn CatalogStore>,
}

struct ComparedServer {
    comparison: ServerComparison,
    feature_count: usize,
}

impl ComparisonEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Compare 2..10 servers on the requested dimensions.
    ///
    /// Any unresolved identifier fails the whole request; comparison
    /// requires complete data for meaningful ranking.
    pub async fn compare(&self, input: &CompareInput) -> Result<CompareOutput> {
        validate_compare(input)?;

        // Resolve in input order so output order matches the request
        let mut compared = Vec::with_capacity(input.server_ids.len());
        for raw in &input.server_ids {
            let identifier = Identifier::parse(raw);
            let entry = self
                .catalog
                .get_by_identifier(&identifier)
                .await?
                .ok_or_else(|| DiscoveryError::not_found(raw.clone()))?;

            let (capabilities, metric) = tokio::try_join!(
                self.catalog.capabilities_for(entry.id),
                self.catalog.latest_metric(entry.id),
            )?;

            let capability_names: Vec<String> =
                capabilities.into_iter().map(|c| c.name).collect();
            compared.push(ComparedServer {
                feature_count: capability_names.len(),
                comparison: ServerComparison {
                    id: entry.id,
                    name: entry.name,
                    slug: entry.slug,
                    capabilities: capability_names,
                    metrics: ComparisonMetrics {
                        latency_ms: metric.as_ref().and_then(|m| m.latency_ms),
                        uptime_pct: metric.as_ref().and_then(|m| m.uptime_pct),
                        success_rate: metric.as_ref().and_then(|m| m.success_rate),
                    },
                    ranking: Ranking {
                        by_latency: 0,
                        by_uptime: 0,
                        by_features: 0,
                    },
                },
            });
        }

        // Lower latency is better, higher uptime is better, more features
        // is better. Unrequested dimensions stay 0.
        let by_latency = if input.compare_by.contains(&CompareDimension::Latency) {
            rank_dimension(&compared, |s| s.comparison.metrics.latency_ms, true)
        } else {
            vec![0; compared.len()]
        };
        let by_uptime = if input.compare_by.contains(&CompareDimension::Uptime) {
            rank_dimension(&compared, |s| s.comparison.metrics.uptime_pct, false)
        } else {
            vec![0; compared.len()]
        };
        let by_features = if input.compare_by.contains(&CompareDimension::Features) {
            rank_dimension(&compared, |s| Some(s.feature_count as f64), false)
        } else {
            vec![0; compared.len()]
        };

        let servers = compared
            .into_iter()
            .enumerate()
            .map(|(i, mut server)| {
                server.comparison.ranking = Ranking {
                    by_latency: by_latency[i],
                    by_uptime: by_uptime[i],
                    by_features: by_features[i],
                };
                server.comparison
            })
            .collect();

        Ok(CompareOutput { servers })
    }
}

/// Ranks are 1-based with 1 = best. Missing values rank 0 ("unranked")
/// regardless of sort direction; ties keep their relative input order.
fn rank_dimension<F>(servers: &[ComparedServer], value: F, ascending: bool) -> Vec<u32>
where
    F: Fn(&ComparedServer) -> Option<f64>,
{
    let mut indexed: Vec<(usize, Option<f64>)> = servers
        .iter()
        .enumerate()
        .map(|(i, s)| (i, value(s)))
        .collect();

    // Stable sort with missing values last
    indexed.sort_by(|(_, a), (_, b)| match (a, b) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (Some(_), None) => std::cmp::Ordering::Less,
        (Some(x), Some(y)) => {
            let ordering = x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        }
    });

    let mut ranks = vec![0u32; servers.len()];
    for (rank, (index, value)) in indexed.iter().enumerate() {
        if value.is_some() {
            ranks[*index] = rank as u32 + 1;
        }
    }
    ranks
}
