//! Shared service state.

use std::sync::Arc;
use std::time::Instant;

use crate::graph::SnowballGraph;

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// The graph served by this process.
    pub graph: Arc<SnowballGraph>,
    started_at: Instant,
}

impl ServiceState {
    /// Serve an existing graph.
    pub fn new(graph: SnowballGraph) -> Self {
        Self {
            graph: Arc::new(graph),
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::new(SnowballGraph::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArticleCandidate, EntityKind};

    #[test]
    fn test_clones_share_graph() {
        let state = ServiceState::default();
        let clone = state.clone();
        state
            .graph
            .submit(&ArticleCandidate::new("Shared").into())
            .unwrap();
        assert_eq!(clone.graph.count(EntityKind::Article), 1);
    }
}
