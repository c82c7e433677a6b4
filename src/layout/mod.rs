//! Layout Engine: deterministic force-directed 2D layout.
//!
//! ## Algorithm
//!
//! ```text
//! place node i of n at origin + r·(cos 2πi/n, sin 2πi/n)     (store order)
//! repeat up to max_iterations:
//!     check cancellation
//!     F = 0
//!     for i < j:           F[i] -= k_repel/d² · u_ij ; F[j] += k_repel/d² · u_ij
//!     for edge (a, b):     F[a] += k_attract(d-L) · u_ab ; F[b] -= k_attract(d-L) · u_ab
//!     for i:               F[i] -= gravity · (p[i] - origin)
//!     for i:               p[i] += clamp(F[i], max_step)
//!     stop if Σ|step| < epsilon
//! ```
//!
//! All forces of an iteration are computed from the positions at its start
//! (Jacobi update), every loop runs in store order, and arithmetic is `f64`
//! throughout, so the same snapshot and parameters always give bit-identical
//! positions. Coincident points are pushed apart along a direction derived
//! from their indices instead of a random one.

pub mod config;

pub use config::{LayoutConfig, Point};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::canonical::{canonical_hash_hex, quantize};
use crate::snapshot::GraphSnapshot;
use crate::types::{Edge, Handle};

/// Distances below this are treated as coincident.
const MIN_DISTANCE: f64 = 1e-6;

/// Golden angle in radians; spreads nudge directions for coincident pairs.
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Errors from layout computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    /// The cancellation token was triggered between iterations.
    #[error("Layout cancelled after {iterations} iterations")]
    Cancelled {
        /// Iterations completed before cancellation.
        iterations: u32,
    },

    /// Parameters are unusable.
    #[error("Invalid layout config: {0}")]
    InvalidConfig(String),
}

/// Cooperative cancellation flag shared between a caller and a running layout.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Straight drawable segment for one relationship edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePath {
    /// The relationship.
    pub edge: Edge,
    /// Start point (source entity).
    pub from: Point,
    /// End point (target entity).
    pub to: Point,
}

/// Computed layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Position of every laid-out entity.
    pub positions: BTreeMap<Handle, Point>,
    /// One path per edge whose endpoints are both laid out.
    pub paths: Vec<EdgePath>,
    /// Iterations run.
    pub iterations: u32,
    /// Whether total displacement fell below `epsilon`.
    pub converged: bool,
    /// Snapshot the layout was computed from.
    pub snapshot_id: String,
    /// Hash of the parameters used.
    pub params_hash: String,
    /// xxh64 over the parameters hash and coordinates quantized to 1e-6.
    pub fingerprint: String,
}

impl Layout {
    /// Position of an entity.
    pub fn position(&self, handle: Handle) -> Option<Point> {
        self.positions.get(&handle).copied()
    }

    /// Axis-aligned bounding box as (min, max), or `None` when empty.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let mut points = self.positions.values();
        let first = *points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

/// Internal struct for computing the fingerprint.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    params_hash: &'a str,
    positions: Vec<(u64, i64, i64)>,
}

fn fingerprint(params_hash: &str, positions: &BTreeMap<Handle, Point>) -> String {
    canonical_hash_hex(&FingerprintInput {
        params_hash,
        positions: positions
            .iter()
            .map(|(h, p)| (h.as_u64(), quantize(p.x), quantize(p.y)))
            .collect(),
    })
}

/// Unit vector from `i` to `j` and their distance.
///
/// Coincident points get a deterministic direction derived from `(i, j)`
/// and the minimum distance.
fn separation(i: usize, j: usize, pi: Point, pj: Point) -> (f64, f64, f64) {
    let dx = pj.x - pi.x;
    let dy = pj.y - pi.y;
    let d = (dx * dx + dy * dy).sqrt();
    if d < MIN_DISTANCE {
        let angle = (i as f64 + 1.0) * GOLDEN_ANGLE + j as f64;
        (angle.cos(), angle.sin(), MIN_DISTANCE)
    } else {
        (dx / d, dy / d, d)
    }
}

/// Compute a layout of a snapshot.
///
/// Checks `cancel` before every iteration. Entities are those of
/// `config.kinds` (all kinds when empty); edges are drawn only when both
/// endpoints are included.
pub fn compute_layout(
    snapshot: &GraphSnapshot,
    config: &LayoutConfig,
    cancel: &CancellationToken,
) -> Result<Layout, LayoutError> {
    config.validate().map_err(LayoutError::InvalidConfig)?;

    let nodes = snapshot.handles(&config.effective_kinds());
    let slot: HashMap<Handle, usize> = nodes.iter().enumerate().map(|(i, h)| (*h, i)).collect();
    let edges: Vec<(Edge, usize, usize)> = snapshot
        .edges
        .iter()
        .filter_map(|e| Some((*e, *slot.get(&e.from)?, *slot.get(&e.to)?)))
        .collect();
    let params_hash = config.params_hash();
    let n = nodes.len();
    let origin = config.origin;

    let mut pos: Vec<Point> = match n {
        0 => Vec::new(),
        1 => vec![origin],
        _ => (0..n)
            .map(|i| {
                let angle = TAU * i as f64 / n as f64;
                Point::new(
                    origin.x + config.initial_radius * angle.cos(),
                    origin.y + config.initial_radius * angle.sin(),
                )
            })
            .collect(),
    };

    let mut iterations = 0;
    let mut converged = n <= 1;
    while !converged && iterations < config.max_iterations {
        if cancel.is_cancelled() {
            info!(iterations, "Layout cancelled");
            return Err(LayoutError::Cancelled { iterations });
        }

        let mut force = vec![(0.0f64, 0.0f64); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let (ux, uy, d) = separation(i, j, pos[i], pos[j]);
                let f = config.k_repel / (d * d);
                force[i].0 -= f * ux;
                force[i].1 -= f * uy;
                force[j].0 += f * ux;
                force[j].1 += f * uy;
            }
        }

        for &(_, a, b) in &edges {
            if a == b {
                continue;
            }
            let (ux, uy, d) = separation(a, b, pos[a], pos[b]);
            let f = config.k_attract * (d - config.ideal_length);
            force[a].0 += f * ux;
            force[a].1 += f * uy;
            force[b].0 -= f * ux;
            force[b].1 -= f * uy;
        }

        if config.gravity > 0.0 {
            for i in 0..n {
                force[i].0 -= config.gravity * (pos[i].x - origin.x);
                force[i].1 -= config.gravity * (pos[i].y - origin.y);
            }
        }

        let mut total = 0.0;
        for i in 0..n {
            let (mut sx, mut sy) = force[i];
            let len = (sx * sx + sy * sy).sqrt();
            if len > config.max_step {
                let scale = config.max_step / len;
                sx *= scale;
                sy *= scale;
            }
            pos[i].x += sx;
            pos[i].y += sy;
            total += (sx * sx + sy * sy).sqrt();
        }

        iterations += 1;
        if total < config.epsilon {
            converged = true;
        }
    }

    let positions: BTreeMap<Handle, Point> = nodes.iter().copied().zip(pos.iter().copied()).collect();
    let paths = edges
        .iter()
        .map(|&(edge, a, b)| EdgePath {
            edge,
            from: pos[a],
            to: pos[b],
        })
        .collect();
    let fingerprint = fingerprint(&params_hash, &positions);

    debug!(nodes = n, edges = edges.len(), "Layout input");
    info!(
        iterations,
        converged,
        fingerprint = %fingerprint,
        "Layout computed"
    );

    Ok(Layout {
        positions,
        paths,
        iterations,
        converged,
        snapshot_id: snapshot.snapshot_id.clone(),
        params_hash,
        fingerprint,
    })
}
