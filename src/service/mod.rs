//! Snowball Graph REST Service
//!
//! Exposes the graph as a REST API for collaborators that do not link the
//! crate directly. The service never fetches bibliographic data itself:
//! expansion requests carry their neighbour records inline.
//!
//! ## Endpoints
//!
//! - `POST /api/candidates` - Merge a batch of candidate records
//! - `GET /api/snapshot` - Copy of the whole graph
//! - `POST /api/expand` - Snowball expansion over supplied neighbour records
//! - `POST /api/layout` - Force-directed layout of a fresh snapshot
//! - `POST /api/merge` - Merge two live entities
//! - `DELETE /api/entities/:handle` - Remove an entity
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_expansion_metrics, record_layout_metrics};
pub use routes::{create_router, error_code, ErrorResponse};
pub use state::ServiceState;
