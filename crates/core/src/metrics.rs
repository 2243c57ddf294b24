// Per-server metrics lookup with a bounded history window

use crate::catalog::CatalogStore;
use crate::error::{DiscoveryError, Result};
use crate::types::{
    CurrentMetrics, GetMetricsInput, GetMetricsOutput, Identifier, MetricsHistoryPoint,
    MetricsReport, ServerSummary,
};
use crate::validation::validate_get_metrics;
use chrono::{Duration, Utc};
use std::sync::Arc;

pub struct MetricsReporter {
    catalog: Arc<dyn CatalogStore>,
}

impl MetricsReporter {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn server_metrics(&self, input: &GetMetricsInput) -> Result<GetMetricsOutput> {
        validate_get_metrics(input)?;

        let identifier = Identifier::parse(&input.server_id);
        let entry = self
            .catalog
            .get_by_identifier(&identifier)
            .await?
            .ok_or_else(|| DiscoveryError::not_found(input.server_id.clone()))?;

        let since = Utc::now() - Duration::hours(input.time_range.hours());
        let (latest, history) = tokio::try_join!(
            self.catalog.latest_metric(entry.id),
            self.catalog.metric_history(entry.id, since),
        )?;

        Ok(GetMetricsOutput {
            server: ServerSummary {
                id: entry.id,
                name: entry.name,
                slug: entry.slug,
            },
            metrics: MetricsReport {
                current: CurrentMetrics {
                    latency_ms: latest.as_ref().and_then(|m| m.latency_ms),
                    success_rate: latest.as_ref().and_then(|m| m.success_rate),
                    uptime_pct: latest.as_ref().and_then(|m| m.uptime_pct),
                    active_connections: latest.as_ref().map(|m| m.active_connections).unwrap_or(0),
                },
                history: history
                    .into_iter()
                    .map(|m| MetricsHistoryPoint {
                        timestamp: m.timestamp,
                        latency_ms: m.latency_ms,
                        success_rate: m.success_rate,
                        uptime_pct: m.uptime_pct,
                    })
                    .collect(),
            },
        })
    }
}
