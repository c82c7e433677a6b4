//! Axum routes for the snowball graph service.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::GraphError;
use crate::layout::{Layout, LayoutConfig, LayoutError};
use crate::merge::MergeReport;
use crate::snapshot::GraphSnapshot;
use crate::snowball::{Direction, InMemoryCitationSource};
use crate::types::{ArticleCandidate, ArticleRef, Candidate, Entity, EntityKind, Handle};
use crate::SCHEMA_VERSION;

use super::middleware::{record_expansion_metrics, record_layout_metrics};
use super::state::ServiceState;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

/// Batch of candidate records to merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Candidates in submission order.
    pub candidates: Vec<Candidate>,
}

/// An accepted candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedDto {
    /// Position in the request.
    pub position: usize,
    /// Handle the candidate merged into.
    pub handle: Handle,
}

/// A rejected candidate or neighbour record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedDto {
    /// Position in the request (frontier origin handle for expansion).
    pub position: u64,
    /// Description of the record.
    pub candidate: String,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error.
    pub error: String,
}

/// Outcome of a batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Accepted candidates.
    pub accepted: Vec<AcceptedDto>,
    /// Rejected candidates.
    pub rejected: Vec<RejectedDto>,
}

/// Neighbour records of one article, supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighbourRecords {
    /// The article the records belong to (live handle or identifying record).
    pub subject: ArticleRef,
    /// Records of the articles it cites.
    #[serde(default)]
    pub references: Vec<ArticleCandidate>,
    /// Records of the articles citing it.
    #[serde(default)]
    pub citations: Vec<ArticleCandidate>,
}

fn default_generations() -> u32 {
    1
}

fn default_direction() -> Direction {
    Direction::Both
}

/// Snowball expansion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandRequest {
    /// Seed articles.
    pub frontier: Vec<Handle>,
    /// Citation direction to follow.
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Generation limit.
    #[serde(default = "default_generations")]
    pub generations: u32,
    /// Neighbour records available to the expansion.
    #[serde(default)]
    pub neighbours: Vec<NeighbourRecords>,
    /// Forget previously visited articles before expanding.
    #[serde(default)]
    pub reset: bool,
}

/// Snowball expansion outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandResponse {
    /// Frontier after the last generation.
    pub new_frontier: Vec<Handle>,
    /// Every article first visited, in discovery order.
    pub discovered: Vec<Handle>,
    /// Generations run.
    pub generations: u32,
    /// Rejected neighbour records (`position` is the origin handle).
    pub errors: Vec<RejectedDto>,
    /// Articles visited in the current expansion session.
    pub visited: usize,
}

/// Layout request. Missing parameters take the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutRequest {
    /// Layout parameters.
    #[serde(default)]
    pub config: Option<LayoutConfig>,
}

/// Explicit merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Surviving entity.
    pub winner: Handle,
    /// Entity retired into the winner.
    pub loser: Handle,
}

/// Removed entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    /// Retired handle.
    pub handle: Handle,
    /// Last record of the entity.
    pub entity: Entity,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded" (structural invariant violated).
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Record schema version.
    pub schema_version: String,
    /// Live articles.
    pub articles: usize,
    /// Live authors.
    pub authors: usize,
    /// Live periodicals.
    pub periodicals: usize,
    /// Live keywords.
    pub keywords: usize,
    /// Seconds since startup.
    pub uptime_secs: u64,
    /// Invariant violation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always "alive".
    pub status: String,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Machine-readable code of a graph error.
pub fn error_code(error: &GraphError) -> &'static str {
    match error {
        GraphError::NotFound(_) => "NOT_FOUND",
        GraphError::KindMismatch { .. } => "KIND_MISMATCH",
        GraphError::ConflictingIdentity { .. } => "CONFLICTING_IDENTITY",
        GraphError::InvalidRelationship { .. } => "INVALID_RELATIONSHIP",
        GraphError::InvalidMerge { .. } => "INVALID_MERGE",
        GraphError::Inconsistent(_) => "INCONSISTENT",
        GraphError::Document(_) => "INVALID_DOCUMENT",
    }
}

fn status_of(error: &GraphError) -> StatusCode {
    match error {
        GraphError::NotFound(_) => StatusCode::NOT_FOUND,
        GraphError::ConflictingIdentity { .. } => StatusCode::CONFLICT,
        GraphError::InvalidRelationship { .. } | GraphError::InvalidMerge { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        GraphError::KindMismatch { .. } | GraphError::Document(_) => StatusCode::BAD_REQUEST,
        GraphError::Inconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn graph_error(error: GraphError) -> ApiError {
    if error.is_fatal() {
        tracing::error!(error = %error, "Graph consistency violated");
    }
    (
        status_of(&error),
        Json(ErrorResponse::new(error_code(&error), error.to_string())),
    )
}

fn layout_error(error: LayoutError) -> ApiError {
    let (status, code) = match &error {
        LayoutError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "INVALID_LAYOUT_CONFIG"),
        LayoutError::Cancelled { .. } => (StatusCode::SERVICE_UNAVAILABLE, "LAYOUT_CANCELLED"),
    };
    (status, Json(ErrorResponse::new(code, error.to_string())))
}

fn join_error(error: tokio::task::JoinError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("TASK_FAILED", format!("Worker task failed: {}", error))),
    )
}

fn rejected(position: u64, candidate: String, error: &GraphError) -> RejectedDto {
    RejectedDto {
        position,
        candidate,
        code: error_code(error).to_string(),
        error: error.to_string(),
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Merge a batch of candidate records.
async fn submit_handler(
    State(state): State<ServiceState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let report = state.graph.submit_all(&request.candidates).map_err(graph_error)?;

    Ok(Json(SubmitResponse {
        accepted: report
            .accepted
            .into_iter()
            .map(|(position, handle)| AcceptedDto { position, handle })
            .collect(),
        rejected: report
            .rejected
            .into_iter()
            .map(|r| rejected(r.position as u64, r.candidate, &r.error))
            .collect(),
    }))
}

/// Copy of the whole graph.
async fn snapshot_handler(State(state): State<ServiceState>) -> Json<GraphSnapshot> {
    Json(state.graph.snapshot())
}

/// Snowball expansion over caller-supplied neighbour records.
async fn expand_handler(
    State(state): State<ServiceState>,
    Json(request): Json<ExpandRequest>,
) -> Result<Json<ExpandResponse>, ApiError> {
    let mut source = InMemoryCitationSource::new();
    for entry in request.neighbours {
        let subject = match entry.subject {
            ArticleRef::Record(record) => *record,
            ArticleRef::Handle(handle) => {
                let article = state.graph.article(handle).map_err(graph_error)?;
                ArticleCandidate {
                    title: article.title,
                    year: article.year,
                    doi: article.doi,
                    ..Default::default()
                }
            }
        };
        let known = source.add_references(&subject, entry.references)
            & source.add_citations(&subject, entry.citations);
        if !known {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(
                    ErrorResponse::new("UNKEYED_SUBJECT", "Neighbour subject has no DOI or title")
                        .with_details(subject.describe()),
                ),
            ));
        }
    }

    let graph = state.graph.clone();
    let start = Instant::now();
    let (report, visited) = tokio::task::spawn_blocking(move || {
        if request.reset {
            graph.reset_expansion();
        }
        graph
            .expand(&request.frontier, request.direction, request.generations, &source)
            .map(|report| (report, graph.visited_count()))
    })
    .await
    .map_err(join_error)?
    .map_err(graph_error)?;

    record_expansion_metrics(
        report.generations,
        report.discovered.len(),
        report.errors.len(),
        start.elapsed().as_millis() as u64,
    );

    Ok(Json(ExpandResponse {
        new_frontier: report.new_frontier,
        discovered: report.discovered,
        generations: report.generations,
        errors: report
            .errors
            .iter()
            .map(|e| rejected(e.origin.as_u64(), e.candidate.clone(), &e.error))
            .collect(),
        visited,
    }))
}

/// Force-directed layout of a fresh snapshot.
async fn layout_handler(
    State(state): State<ServiceState>,
    Json(request): Json<LayoutRequest>,
) -> Result<Json<Layout>, ApiError> {
    let config = request
        .config
        .unwrap_or_else(|| state.graph.config().layout.clone());
    let graph = state.graph.clone();
    let start = Instant::now();

    let layout = tokio::task::spawn_blocking(move || graph.compute_layout(&config))
        .await
        .map_err(join_error)?
        .map_err(layout_error)?;

    record_layout_metrics(
        layout.positions.len(),
        layout.iterations,
        layout.converged,
        start.elapsed().as_millis() as u64,
    );
    Ok(Json(layout))
}

/// Merge two live entities.
async fn merge_handler(
    State(state): State<ServiceState>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<MergeReport>, ApiError> {
    state
        .graph
        .merge_entities(request.winner, request.loser)
        .map(Json)
        .map_err(graph_error)
}

/// Remove an entity and its relationships.
async fn remove_handler(
    State(state): State<ServiceState>,
    Path(raw): Path<u64>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let handle = Handle::from_raw(raw);
    let entity = state.graph.remove(handle).map_err(graph_error)?;
    Ok(Json(RemovedResponse { handle, entity }))
}

/// Health check endpoint (detailed).
///
/// Reports "degraded" when a structural invariant check fails.
async fn health_handler(State(state): State<ServiceState>) -> Json<HealthResponse> {
    let graph = &state.graph;
    let details = graph.check_invariants().err().map(|e| e.to_string());

    Json(HealthResponse {
        status: if details.is_none() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        articles: graph.count(EntityKind::Article),
        authors: graph.count(EntityKind::Author),
        periodicals: graph.count(EntityKind::Periodical),
        keywords: graph.count(EntityKind::Keyword),
        uptime_secs: state.uptime_secs(),
        details,
    })
}

/// Liveness probe endpoint. Does not touch the graph.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the snowball graph service.
pub fn create_router(state: ServiceState) -> Router {
    Router::new()
        // Graph mutation
        .route("/api/candidates", post(submit_handler))
        .route("/api/expand", post(expand_handler))
        .route("/api/merge", post(merge_handler))
        .route("/api/entities/:handle", delete(remove_handler))
        // Read-only views
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/layout", post(layout_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn seeded() -> ServiceState {
        let state = ServiceState::default();
        state
            .graph
            .submit(&ArticleCandidate::new("A").with_doi("10.1/a").into())
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_submit_candidates() {
        let state = ServiceState::default();
        let router = create_router(state.clone());
        let body = json!({
            "candidates": [
                { "kind": "article", "title": "B", "doi": "10.1/b",
                  "cites": [ { "record": { "title": "A", "doi": "10.1/a" } } ] },
                { "kind": "article", "title": "A again", "doi": "https://doi.org/10.1/A" },
                { "kind": "author", "name": "Jane Doe" }
            ]
        });

        let (status, value) = call(router, "POST", "/api/candidates", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["accepted"].as_array().unwrap().len(), 3);
        assert!(value["rejected"].as_array().unwrap().is_empty());
        assert_eq!(state.graph.count(EntityKind::Article), 2);
    }

    #[tokio::test]
    async fn test_snapshot_and_health() {
        let state = seeded();

        let (status, snapshot) = call(create_router(state.clone()), "GET", "/api/snapshot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["articles"][0]["title"], "A");
        assert_eq!(snapshot["snapshot_id"].as_str().unwrap().len(), 16);

        let (status, health) = call(create_router(state.clone()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["articles"], 1);

        let (status, live) = call(create_router(state), "GET", "/health/live", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(live["status"], "alive");
    }

    #[tokio::test]
    async fn test_expand_with_inline_neighbours() {
        let state = seeded();
        let seed = state.graph.snapshot().articles[0].handle;
        let body = json!({
            "frontier": [seed],
            "direction": "cited_by",
            "generations": 1,
            "neighbours": [{
                "subject": { "handle": seed },
                "citations": [
                    { "title": "B", "doi": "10.1/b" },
                    { "title": "C", "doi": "10.1/c" }
                ]
            }]
        });

        let (status, value) = call(create_router(state.clone()), "POST", "/api/expand", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["new_frontier"].as_array().unwrap().len(), 2);
        assert_eq!(value["generations"], 1);
        assert_eq!(state.graph.cited_by(seed).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_expansion_shares_visited_set() {
        let state = ServiceState::default();
        let b = state
            .graph
            .submit(
                &ArticleCandidate::new("B")
                    .with_doi("10.1/b")
                    .citing(ArticleCandidate::new("A").with_doi("10.1/a"))
                    .into(),
            )
            .unwrap();

        let body = json!({ "frontier": [b], "direction": "both", "generations": 1 });
        let (status, first) = call(create_router(state.clone()), "POST", "/api/expand", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let next = first["new_frontier"].clone();
        assert_eq!(next.as_array().unwrap().len(), 1);

        let body = json!({ "frontier": next.clone(), "direction": "both", "generations": 1 });
        let (status, second) = call(create_router(state.clone()), "POST", "/api/expand", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(second["new_frontier"].as_array().unwrap().is_empty());
        assert_eq!(second["visited"], 2);

        let body = json!({ "frontier": next, "direction": "both", "generations": 1, "reset": true });
        let (_, fresh) = call(create_router(state), "POST", "/api/expand", Some(body)).await;
        assert_eq!(fresh["new_frontier"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expand_unknown_frontier_is_not_found() {
        let body = json!({ "frontier": [999], "direction": "both" });
        let (status, value) = call(create_router(seeded()), "POST", "/api/expand", Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_layout_endpoint() {
        let state = seeded();
        let (status, value) = call(create_router(state), "POST", "/api/layout", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["positions"].as_object().unwrap().len(), 1);

        let bad = json!({ "config": { "max_step": 0.0 } });
        let (status, value) = call(create_router(seeded()), "POST", "/api/layout", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["code"], "INVALID_LAYOUT_CONFIG");
    }

    #[tokio::test]
    async fn test_merge_and_remove() {
        let state = ServiceState::default();
        let first = state.graph.submit(&ArticleCandidate::new("Graph theory").into()).unwrap();
        let second = state.graph.submit(&ArticleCandidate::new("Graph theroy").into()).unwrap();

        let body = json!({ "winner": first, "loser": second });
        let (status, value) = call(create_router(state.clone()), "POST", "/api/merge", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["winner"], first.as_u64());

        let self_merge = json!({ "winner": first, "loser": first });
        let (status, value) = call(create_router(state.clone()), "POST", "/api/merge", Some(self_merge)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(value["code"], "INVALID_MERGE");

        let uri = format!("/api/entities/{}", first.as_u64());
        let (status, value) = call(create_router(state.clone()), "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["entity"]["title"], "Graph theory");

        let (status, _) = call(create_router(state), "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
