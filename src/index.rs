//! Bidirectional relationship index.
//!
//! Relationships are stored as handle-to-handle lists keyed by
//! `(RelationKind, Handle)`, once in the forward direction (article side)
//! and once in the reverse direction. Every mutation touches both maps, and
//! every query hands out an owned copy so callers can only mutate through
//! the index's own methods.
//!
//! ## Ordering
//!
//! Lists keep insertion order (author position is semantic). Maps are
//! `BTreeMap`s so that [`RelationIndex::edges`] is deterministic.

use std::collections::BTreeMap;

use crate::error::{GraphError, GraphResult};
use crate::types::{Edge, Handle, RelationKind};

type Key = (RelationKind, Handle);

/// Outcome of a [`RelationIndex::rewire`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewireReport {
    /// Number of edges re-pointed from the old handle to the new one.
    pub moved: usize,
    /// Edges of single-valued kinds that could not be moved because the new
    /// handle already had a different target.
    pub dropped: Vec<Edge>,
}

/// Bidirectional relationship index.
#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    forward: BTreeMap<Key, Vec<Handle>>,
    reverse: BTreeMap<Key, Vec<Handle>>,
}

fn push_unique(list: &mut Vec<Handle>, handle: Handle) -> bool {
    if list.contains(&handle) {
        false
    } else {
        list.push(handle);
        true
    }
}

fn remove_item(list: &mut Vec<Handle>, handle: Handle) -> bool {
    match list.iter().position(|h| *h == handle) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

/// Replace `old` with `new` in place, or drop `old` if `new` is already present.
fn replace_or_remove(list: &mut Vec<Handle>, old: Handle, new: Handle) -> bool {
    match list.iter().position(|h| *h == old) {
        Some(pos) => {
            if list.contains(&new) {
                list.remove(pos);
            } else {
                list[pos] = new;
            }
            true
        }
        None => false,
    }
}

fn list_contains(map: &BTreeMap<Key, Vec<Handle>>, key: &Key, handle: Handle) -> bool {
    map.get(key).map(|l| l.contains(&handle)).unwrap_or(false)
}

impl RelationIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `from -> to`, updating both directions.
    ///
    /// Returns `Ok(false)` if the edge already existed. Fails with
    /// `InvalidRelationship` when a single-valued kind already has a
    /// different target, and with `Inconsistent` if only one direction of
    /// the edge is present.
    pub fn link(&mut self, kind: RelationKind, from: Handle, to: Handle) -> GraphResult<bool> {
        let fwd_has = list_contains(&self.forward, &(kind, from), to);
        let rev_has = list_contains(&self.reverse, &(kind, to), from);
        if fwd_has != rev_has {
            return Err(GraphError::Inconsistent(format!(
                "asymmetric {} edge {} -> {} (forward: {}, reverse: {})",
                kind, from, to, fwd_has, rev_has
            )));
        }
        if fwd_has {
            return Ok(false);
        }

        if kind.is_single_valued() {
            if let Some(existing) = self.forward.get(&(kind, from)).and_then(|l| l.first()) {
                return Err(GraphError::InvalidRelationship {
                    kind,
                    from,
                    to,
                    reason: format!("already linked to {}", existing),
                });
            }
        }

        self.forward.entry((kind, from)).or_default().push(to);
        self.reverse.entry((kind, to)).or_default().push(from);
        Ok(true)
    }

    /// Remove `from -> to` from both directions.
    ///
    /// Returns `Ok(false)` if the edge did not exist.
    pub fn unlink(&mut self, kind: RelationKind, from: Handle, to: Handle) -> GraphResult<bool> {
        let fwd_removed = self
            .forward
            .get_mut(&(kind, from))
            .map(|l| remove_item(l, to))
            .unwrap_or(false);
        let rev_removed = self
            .reverse
            .get_mut(&(kind, to))
            .map(|l| remove_item(l, from))
            .unwrap_or(false);
        self.prune(&[(kind, from)], &[(kind, to)]);

        if fwd_removed != rev_removed {
            return Err(GraphError::Inconsistent(format!(
                "asymmetric {} edge {} -> {} found while unlinking",
                kind, from, to
            )));
        }
        Ok(fwd_removed)
    }

    /// Replace every occurrence of `old` (either side, every kind) with `new`.
    ///
    /// Position in ordered lists is preserved where `new` was not already
    /// present; `old`'s own outgoing targets are appended after `new`'s.
    /// A self-edge on `old` becomes a self-edge on `new`.
    pub fn rewire(&mut self, old: Handle, new: Handle) -> GraphResult<RewireReport> {
        let mut report = RewireReport::default();
        if old == new {
            return Ok(report);
        }

        for kind in RelationKind::ALL {
            // Detach a self-edge first so the two passes below never see `old` on both sides.
            let had_self = list_contains(&self.forward, &(kind, old), old);
            if had_self {
                self.unlink(kind, old, old)?;
            }

            // Edges pointing at `old`.
            if let Some(sources) = self.reverse.remove(&(kind, old)) {
                for source in sources {
                    let list = self.forward.entry((kind, source)).or_default();
                    if !replace_or_remove(list, old, new) {
                        return Err(GraphError::Inconsistent(format!(
                            "reverse {} entry {} <- {} has no forward edge",
                            kind, old, source
                        )));
                    }
                    push_unique(self.reverse.entry((kind, new)).or_default(), source);
                    report.moved += 1;
                }
            }

            // Edges leaving `old`.
            if let Some(targets) = self.forward.remove(&(kind, old)) {
                for target in targets {
                    let new_targets = self.forward.entry((kind, new)).or_default();
                    if kind.is_single_valued()
                        && !new_targets.is_empty()
                        && !new_targets.contains(&target)
                    {
                        if let Some(l) = self.reverse.get_mut(&(kind, target)) {
                            remove_item(l, old);
                        }
                        report.dropped.push(Edge::new(kind, old, target));
                        continue;
                    }
                    push_unique(new_targets, target);
                    let list = self.reverse.entry((kind, target)).or_default();
                    if !replace_or_remove(list, old, new) {
                        return Err(GraphError::Inconsistent(format!(
                            "forward {} entry {} -> {} has no reverse edge",
                            kind, old, target
                        )));
                    }
                    report.moved += 1;
                }
            }

            if had_self {
                self.link(kind, new, new)?;
                report.moved += 1;
            }
        }

        self.prune_all();
        self.verify_handle(new)?;
        if self.mentions(old) {
            return Err(GraphError::Inconsistent(format!(
                "handle {} still referenced after rewire to {}",
                old, new
            )));
        }
        Ok(report)
    }

    /// Remove every edge touching `handle` and return the removed edges.
    pub fn remove_all(&mut self, handle: Handle) -> GraphResult<Vec<Edge>> {
        let mut removed = Vec::new();
        for kind in RelationKind::ALL {
            for target in self.targets(kind, handle) {
                if self.unlink(kind, handle, target)? {
                    removed.push(Edge::new(kind, handle, target));
                }
            }
            for source in self.sources(kind, handle) {
                if self.unlink(kind, source, handle)? {
                    removed.push(Edge::new(kind, source, handle));
                }
            }
        }
        Ok(removed)
    }

    /// Targets of `from` for a kind (cites, authored-by, published-in, tagged-with).
    pub fn targets(&self, kind: RelationKind, from: Handle) -> Vec<Handle> {
        self.forward.get(&(kind, from)).cloned().unwrap_or_default()
    }

    /// Sources pointing at `to` for a kind (cited-by, authored, publishes, tags).
    pub fn sources(&self, kind: RelationKind, to: Handle) -> Vec<Handle> {
        self.reverse.get(&(kind, to)).cloned().unwrap_or_default()
    }

    /// Whether `from -> to` exists.
    pub fn contains(&self, kind: RelationKind, from: Handle, to: Handle) -> bool {
        list_contains(&self.forward, &(kind, from), to)
    }

    /// All edges in canonical order (kind, source handle, list position).
    pub fn edges(&self) -> Vec<Edge> {
        self.forward
            .iter()
            .flat_map(|(&(kind, from), targets)| {
                targets.iter().map(move |&to| Edge::new(kind, from, to))
            })
            .collect()
    }

    /// Edges touching a handle on either side.
    pub fn edges_touching(&self, handle: Handle) -> Vec<Edge> {
        let mut edges = Vec::new();
        for kind in RelationKind::ALL {
            for to in self.targets(kind, handle) {
                edges.push(Edge::new(kind, handle, to));
            }
            for from in self.sources(kind, handle) {
                if from != handle {
                    edges.push(Edge::new(kind, from, handle));
                }
            }
        }
        edges
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }

    /// Whether the index holds no edges.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any list or key mentions the handle.
    pub fn mentions(&self, handle: Handle) -> bool {
        let in_map = |map: &BTreeMap<Key, Vec<Handle>>| {
            map.iter()
                .any(|(&(_, k), list)| k == handle || list.contains(&handle))
        };
        in_map(&self.forward) || in_map(&self.reverse)
    }

    /// Check both directions of every edge touching a handle.
    pub fn verify_handle(&self, handle: Handle) -> GraphResult<()> {
        for kind in RelationKind::ALL {
            for to in self.targets(kind, handle) {
                if !list_contains(&self.reverse, &(kind, to), handle) {
                    return Err(GraphError::Inconsistent(format!(
                        "{} edge {} -> {} missing reverse entry",
                        kind, handle, to
                    )));
                }
            }
            for from in self.sources(kind, handle) {
                if !list_contains(&self.forward, &(kind, from), handle) {
                    return Err(GraphError::Inconsistent(format!(
                        "{} edge {} -> {} missing forward entry",
                        kind, from, handle
                    )));
                }
            }
            if kind.is_single_valued() && self.targets(kind, handle).len() > 1 {
                return Err(GraphError::Inconsistent(format!(
                    "{} has more than one {} target",
                    handle, kind
                )));
            }
        }
        Ok(())
    }

    /// Full symmetric check of the index.
    pub fn check_consistency(&self) -> GraphResult<()> {
        for (&(kind, from), targets) in &self.forward {
            for &to in targets {
                if !list_contains(&self.reverse, &(kind, to), from) {
                    return Err(GraphError::Inconsistent(format!(
                        "{} edge {} -> {} missing reverse entry",
                        kind, from, to
                    )));
                }
            }
        }
        for (&(kind, to), sources) in &self.reverse {
            for &from in sources {
                if !list_contains(&self.forward, &(kind, from), to) {
                    return Err(GraphError::Inconsistent(format!(
                        "{} edge {} -> {} missing forward entry",
                        kind, from, to
                    )));
                }
            }
        }
        Ok(())
    }

    fn prune(&mut self, forward_keys: &[Key], reverse_keys: &[Key]) {
        for key in forward_keys {
            if self.forward.get(key).map(Vec::is_empty).unwrap_or(false) {
                self.forward.remove(key);
            }
        }
        for key in reverse_keys {
            if self.reverse.get(key).map(Vec::is_empty).unwrap_or(false) {
                self.reverse.remove(key);
            }
        }
    }

    fn prune_all(&mut self) {
        self.forward.retain(|_, l| !l.is_empty());
        self.reverse.retain(|_, l| !l.is_empty());
    }
}
