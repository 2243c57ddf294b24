// Input validation for the three public operations.
// Violations surface as `Validation` errors before any collaborator call.

use crate::error::{DiscoveryError, Result};
use crate::types::{CompareInput, DiscoverInput, GetMetricsInput};

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 20;
pub const MIN_COMPARE_SERVERS: usize = 2;
pub const MAX_COMPARE_SERVERS: usize = 10;

/// Validate a discover request, returning the effective result limit
pub fn validate_discover(input: &DiscoverInput) -> Result<usize> {
    if input.need.trim().is_empty() {
        return Err(DiscoveryError::validation("need is required"));
    }

    let limit = input.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(DiscoveryError::validation(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    if let Some(constraints) = &input.constraints {
        if let Some(max_latency) = constraints.max_latency_ms {
            if max_latency <= 0.0 {
                return Err(DiscoveryError::validation(
                    "max_latency_ms must be positive",
                ));
            }
        }
    }

    Ok(limit)
}

pub fn validate_get_metrics(input: &GetMetricsInput) -> Result<()> {
    if input.server_id.trim().is_empty() {
        return Err(DiscoveryError::validation("server_id is required"));
    }
    Ok(())
}

pub fn validate_compare(input: &CompareInput) -> Result<()> {
    if input.server_ids.len() < MIN_COMPARE_SERVERS {
        return Err(DiscoveryError::validation(
            "at least 2 servers required for comparison",
        ));
    }
    if input.server_ids.len() > MAX_COMPARE_SERVERS {
        return Err(DiscoveryError::validation(
            "maximum 10 servers can be compared",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompareDimension, Constraints};

    #[test]
    fn test_discover_requires_need() {
        let input = DiscoverInput {
            need: "   ".to_string(),
            constraints: None,
            limit: None,
        };
        assert!(matches!(
            validate_discover(&input),
            Err(DiscoveryError::Validation(_))
        ));
    }

    #[test]
    fn test_discover_default_limit() {
        let input = DiscoverInput {
            need: "send emails".to_string(),
            constraints: None,
            limit: None,
        };
        assert_eq!(validate_discover(&input).unwrap(), 5);
    }

    #[test]
    fn test_discover_rejects_oversized_limit() {
        let input = DiscoverInput {
            need: "send emails".to_string(),
            constraints: None,
            limit: Some(21),
        };
        assert!(validate_discover(&input).is_err());
    }

    #[test]
    fn test_discover_rejects_nonpositive_latency_constraint() {
        let input = DiscoverInput {
            need: "db".to_string(),
            constraints: Some(Constraints {
                max_latency_ms: Some(0.0),
                ..Default::default()
            }),
            limit: None,
        };
        assert!(validate_discover(&input).is_err());
    }

    #[test]
    fn test_metrics_requires_server_id() {
        let input = GetMetricsInput {
            server_id: String::new(),
            time_range: Default::default(),
        };
        assert!(validate_get_metrics(&input).is_err());
    }

    #[test]
    fn test_compare_bounds() {
        let one = CompareInput {
            server_ids: vec!["a".to_string()],
            compare_by: CompareDimension::all(),
        };
        assert!(validate_compare(&one).is_err());

        let eleven = CompareInput {
            server_ids: (0..11).map(|i| format!("s{}", i)).collect(),
            compare_by: CompareDimension::all(),
        };
        assert!(validate_compare(&eleven).is_err());

        let two = CompareInput {
            server_ids: vec!["a".to_string(), "b".to_string()],
            compare_by: CompareDimension::all(),
        };
        assert!(validate_compare(&two).is_ok());
    }
}
