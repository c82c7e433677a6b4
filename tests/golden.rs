//! Golden tests for the snowball graph.
//!
//! These tests verify determinism of snapshot ids, layout fingerprints and
//! document hashes.

use snowball_graph::{
    ArticleCandidate, AuthorCandidate, CancellationToken, EntityKind, GraphConfig, GraphDocument,
    KeywordCandidate, LayoutConfig, LayoutError, PeriodicalCandidate, Point, SnowballGraph,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn article(title: &str, doi: &str) -> ArticleCandidate {
    ArticleCandidate::new(title).with_doi(doi).with_year(2020)
}

fn build_review_graph() -> SnowballGraph {
    //     S1 ──cites──► A ◄──cites── S2
    //      │            │
    //      └──► B ◄─────┘
    //           │
    //           └──► C ──► S1   (cycle)
    let graph = SnowballGraph::new();
    let candidates = vec![
        article("Seed one", "10.1/s1")
            .in_start_set()
            .with_author(AuthorCandidate::new("Jane Doe").with_affiliation("MIT"))
            .with_periodical(PeriodicalCandidate::new("Nature").with_issn("0028-0836"))
            .with_keyword(KeywordCandidate::new("snowballing"))
            .citing(article("Paper A", "10.1/a"))
            .citing(article("Paper B", "10.1/b")),
        article("Seed two", "10.1/s2")
            .in_start_set()
            .with_author(AuthorCandidate::new("John Roe"))
            .citing(article("Paper A", "10.1/a")),
        article("Paper A", "10.1/a").citing(article("Paper B", "10.1/b")),
        article("Paper B", "10.1/b").citing(article("Paper C", "10.1/c")),
        article("Paper C", "10.1/c").citing(article("Seed one", "10.1/s1")),
    ];
    for c in candidates {
        graph.submit(&c.into()).unwrap();
    }
    graph
}

// ─────────────────────────────────────────────────────────────────────────────
// DETERMINISM TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_same_content_same_snapshot_id_across_builds() {
    let ids: Vec<String> = (0..20).map(|_| build_review_graph().snapshot().snapshot_id).collect();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(&ids[0], id, "Snapshot id must be deterministic (build {} differs)", i);
    }
    eprintln!("Deterministic snapshot_id: {}", ids[0]);
}

#[test]
fn test_layout_fingerprint_100_runs() {
    let graph = build_review_graph();
    let snapshot = graph.snapshot();
    let config = LayoutConfig::default();

    let first = snowball_graph::compute_layout(&snapshot, &config, &CancellationToken::new()).unwrap();
    for i in 1..100 {
        let again = snowball_graph::compute_layout(&snapshot, &config, &CancellationToken::new()).unwrap();
        assert_eq!(first.fingerprint, again.fingerprint, "run {} differs from run 0", i);
        assert_eq!(first.positions, again.positions);
    }
}

#[test]
fn test_layout_identical_across_independent_graphs() {
    let a = build_review_graph().default_layout().unwrap();
    let b = build_review_graph().default_layout().unwrap();
    assert_eq!(a.snapshot_id, b.snapshot_id);
    assert_eq!(a.fingerprint, b.fingerprint);
    for (h, p) in &a.positions {
        let q = b.positions[h];
        assert_eq!(p.x.to_bits(), q.x.to_bits());
        assert_eq!(p.y.to_bits(), q.y.to_bits());
    }
}

#[test]
fn test_param_change_changes_fingerprint() {
    let graph = build_review_graph();
    let base = graph.compute_layout(&LayoutConfig::default()).unwrap();

    let mut stiffer = LayoutConfig::default();
    stiffer.k_attract = 0.2;
    let changed = graph.compute_layout(&stiffer).unwrap();

    assert_ne!(base.params_hash, changed.params_hash);
    assert_ne!(base.fingerprint, changed.fingerprint);
    assert_eq!(base.snapshot_id, changed.snapshot_id);
}

#[test]
fn test_mutation_changes_snapshot_id() {
    let graph = build_review_graph();
    let before = graph.snapshot().snapshot_id;
    graph
        .submit(&article("Paper D", "10.1/d").citing(article("Paper A", "10.1/a")).into())
        .unwrap();
    assert_ne!(before, graph.snapshot().snapshot_id);
}

#[test]
fn test_layout_covers_every_entity_and_edge() {
    let graph = build_review_graph();
    let snapshot = graph.snapshot();
    let layout = graph.default_layout().unwrap();

    assert_eq!(layout.positions.len(), snapshot.entity_count());
    assert_eq!(layout.paths.len(), snapshot.edges.len());
    for p in layout.positions.values() {
        assert!(p.x.is_finite() && p.y.is_finite());
    }
}

#[test]
fn test_articles_only_layout() {
    let graph = build_review_graph();
    let layout = graph.compute_layout(&LayoutConfig::articles_only()).unwrap();
    assert_eq!(layout.positions.len(), graph.count(EntityKind::Article));
    assert!(layout
        .paths
        .iter()
        .all(|p| p.edge.kind == snowball_graph::RelationKind::Cites));
}

#[test]
fn test_single_entity_lands_on_origin() {
    let graph = SnowballGraph::new();
    let h = graph.submit(&ArticleCandidate::new("Alone").into()).unwrap();
    let mut config = LayoutConfig::default();
    config.origin = Point::new(12.5, -4.0);

    let layout = graph.compute_layout(&config).unwrap();
    assert_eq!(layout.position(h), Some(Point::new(12.5, -4.0)));
    assert!(layout.converged);
}

#[test]
fn test_cancelled_layout_reports_cancellation() {
    let graph = build_review_graph();
    let token = CancellationToken::new();
    token.cancel();
    let err = graph
        .compute_layout_with_cancel(&LayoutConfig::default(), &token)
        .unwrap_err();
    assert_eq!(err, LayoutError::Cancelled { iterations: 0 });
}

#[test]
fn test_document_hash_survives_round_trip() {
    let graph = build_review_graph();
    let doc = graph.to_document();
    let json = doc.to_json().unwrap();

    let restored =
        SnowballGraph::from_document(&GraphDocument::from_json(&json).unwrap(), GraphConfig::default())
            .unwrap();
    let again = restored.to_document();

    assert_eq!(doc.content_hash(), again.content_hash());
    assert_eq!(graph.snapshot().edges.len(), restored.snapshot().edges.len());
    restored.check_invariants().unwrap();
}
