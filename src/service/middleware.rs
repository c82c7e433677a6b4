//! Service middleware for request metrics.
//!
//! ## Metrics Exposed (as structured log events)
//!
//! - `request` - path pattern, method, status and latency of every request
//! - `expansion` - generations, discovered articles and rejected records
//! - `layout` - laid-out entities, iterations and convergence

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "snowball_graph::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Numeric handle segments become `:handle`.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":handle"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record snowball expansion metrics.
pub fn record_expansion_metrics(generations: u32, discovered: usize, errors: usize, latency_ms: u64) {
    info!(
        target: "snowball_graph::metrics",
        metric_type = "expansion",
        generations = generations,
        discovered = discovered,
        errors = errors,
        latency_ms = latency_ms,
        "expansion_metric"
    );
}

/// Record layout metrics.
pub fn record_layout_metrics(entities: usize, iterations: u32, converged: bool, latency_ms: u64) {
    info!(
        target: "snowball_graph::metrics",
        metric_type = "layout",
        entities = entities,
        iterations = iterations,
        converged = converged,
        latency_ms = latency_ms,
        "layout_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_handles() {
        assert_eq!(normalize_path("/api/entities/42"), "/api/entities/:handle");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/live"), "/health/live");
        assert_eq!(normalize_path("/api/v1/snapshot"), "/api/v1/snapshot");
    }
}
