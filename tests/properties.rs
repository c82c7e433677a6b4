//! Property tests: structural invariants under random operation sequences.

use proptest::prelude::*;
use snowball_graph::{
    ArticleCandidate, AuthorCandidate, Candidate, Direction, EntityKind, IndexOnly, SnowballGraph,
};

#[derive(Debug, Clone)]
enum Op {
    Submit { doi: u8, cites: Vec<u8>, author: Option<u8> },
    Remove(usize),
    Merge(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..12, prop::collection::vec(0u8..12, 0..4), prop::option::of(0u8..4))
            .prop_map(|(doi, cites, author)| Op::Submit { doi, cites, author }),
        1 => any::<usize>().prop_map(Op::Remove),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Merge(a, b)),
    ]
}

fn candidate(doi: u8, cites: &[u8], author: Option<u8>) -> Candidate {
    let mut c = ArticleCandidate::new(format!("Paper {}", doi)).with_doi(format!("10.9/{}", doi));
    for target in cites {
        c = c.citing(
            ArticleCandidate::new(format!("Paper {}", target)).with_doi(format!("10.9/{}", target)),
        );
    }
    if let Some(a) = author {
        c = c.with_author(AuthorCandidate::new(format!("Author {}", a)));
    }
    c.into()
}

fn live_articles(graph: &SnowballGraph) -> Vec<snowball_graph::Handle> {
    graph.snapshot().handles(&[EntityKind::Article])
}

fn apply(graph: &SnowballGraph, op: &Op) {
    match op {
        Op::Submit { doi, cites, author } => {
            let _ = graph.submit(&candidate(*doi, cites, *author));
        }
        Op::Remove(i) => {
            let live = live_articles(graph);
            if !live.is_empty() {
                let _ = graph.remove(live[i % live.len()]);
            }
        }
        Op::Merge(i, j) => {
            let live = live_articles(graph);
            if !live.is_empty() {
                let _ = graph.merge_entities(live[i % live.len()], live[j % live.len()]);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cites_and_cited_by_stay_inverse(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let graph = SnowballGraph::new();
        for op in &ops {
            apply(&graph, op);
        }

        for a in live_articles(&graph) {
            for c in graph.cites(a).unwrap() {
                prop_assert!(graph.cited_by(c).unwrap().contains(&a));
            }
            for c in graph.cited_by(a).unwrap() {
                prop_assert!(graph.cites(c).unwrap().contains(&a));
            }
        }
        prop_assert!(graph.check_invariants().is_ok());
    }

    #[test]
    fn no_edge_touches_a_retired_handle(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let graph = SnowballGraph::new();
        for op in &ops {
            apply(&graph, op);
        }

        let snapshot = graph.snapshot();
        let live = snapshot.handles(&EntityKind::ALL);
        for edge in &snapshot.edges {
            prop_assert!(live.binary_search(&edge.from).is_ok());
            prop_assert!(live.binary_search(&edge.to).is_ok());
        }
    }

    #[test]
    fn resubmission_is_idempotent(
        ops in prop::collection::vec(op_strategy(), 0..20),
        doi in 0u8..12,
        cites in prop::collection::vec(0u8..12, 0..4),
        author in prop::option::of(0u8..4),
    ) {
        let graph = SnowballGraph::new();
        for op in &ops {
            apply(&graph, op);
        }

        let c = candidate(doi, &cites, author);
        if let Ok(first) = graph.submit(&c) {
            let before = graph.snapshot().snapshot_id;
            let second = graph.submit(&c).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(before, graph.snapshot().snapshot_id);
        }
    }

    #[test]
    fn expansion_never_revisits(ops in prop::collection::vec(op_strategy(), 1..40), limit in 0u32..6) {
        let graph = SnowballGraph::new();
        for op in &ops {
            apply(&graph, op);
        }
        let live = live_articles(&graph);
        prop_assume!(!live.is_empty());

        let seed = live[0];
        let report = graph.expand(&[seed], Direction::Both, limit, &IndexOnly).unwrap();

        let mut seen = report.discovered.clone();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), report.discovered.len());
        prop_assert!(!report.discovered.contains(&seed));
        prop_assert!(report.generations <= limit);
    }
}
