//! Layout parameters (force model v1).
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Floats are quantized to integers before hashing (×1e6, rounded to i64),
//! so `params_hash` is stable across platforms and serde_json versions and
//! can be embedded in layout fingerprints.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_hash_hex, quantize};
use crate::types::EntityKind;
use crate::LAYOUT_MODEL_VERSION;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Force-directed layout parameters.
///
/// ## Parameters
///
/// - `ideal_length`: rest length `L` of every relationship spring
/// - `k_attract`: spring constant; force = `k_attract * (d - L)`
/// - `k_repel`: repulsion constant; force = `k_repel / d²` between every pair
/// - `gravity`: pull toward `origin` proportional to distance (0 disables)
/// - `max_step`: per-node displacement cap per iteration
/// - `epsilon`: stop once total displacement of an iteration falls below this
/// - `max_iterations`: hard iteration cap
/// - `initial_radius`: radius of the initial placement circle
/// - `kinds`: entity kinds to lay out (empty = all kinds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Force model version identifier.
    pub version: String,
    /// Spring rest length.
    pub ideal_length: f64,
    /// Spring constant.
    pub k_attract: f64,
    /// Repulsion constant.
    pub k_repel: f64,
    /// Linear pull toward the origin.
    pub gravity: f64,
    /// Per-node displacement cap per iteration.
    pub max_step: f64,
    /// Convergence threshold on total displacement.
    pub epsilon: f64,
    /// Iteration cap.
    pub max_iterations: u32,
    /// Radius of the initial circle.
    pub initial_radius: f64,
    /// Layout centre; a single entity is placed here.
    pub origin: Point,
    /// Entity kinds to include (empty = all).
    pub kinds: Vec<EntityKind>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            version: LAYOUT_MODEL_VERSION.to_string(),
            ideal_length: 100.0,
            k_attract: 0.05,
            k_repel: 10_000.0,
            gravity: 0.01,
            max_step: 10.0,
            epsilon: 0.01,
            max_iterations: 500,
            initial_radius: 200.0,
            origin: Point::default(),
            kinds: Vec::new(),
        }
    }
}

/// Quantized parameters for deterministic hashing.
#[derive(Serialize)]
struct QuantizedLayoutParams {
    version: String,
    ideal_length: i64,
    k_attract: i64,
    k_repel: i64,
    gravity: i64,
    max_step: i64,
    epsilon: i64,
    max_iterations: u32,
    initial_radius: i64,
    origin: (i64, i64),
    kinds: Vec<EntityKind>,
}

impl LayoutConfig {
    /// Layout of the article citation network only.
    pub fn articles_only() -> Self {
        Self {
            kinds: vec![EntityKind::Article],
            ..Self::default()
        }
    }

    /// Kinds actually laid out.
    pub fn effective_kinds(&self) -> Vec<EntityKind> {
        if self.kinds.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            let mut kinds = self.kinds.clone();
            kinds.sort();
            kinds.dedup();
            kinds
        }
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<(), String> {
        let finite = [
            ("ideal_length", self.ideal_length),
            ("k_attract", self.k_attract),
            ("k_repel", self.k_repel),
            ("gravity", self.gravity),
            ("max_step", self.max_step),
            ("epsilon", self.epsilon),
            ("initial_radius", self.initial_radius),
            ("origin.x", self.origin.x),
            ("origin.y", self.origin.y),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(format!("{} must be finite, got {}", name, value));
            }
        }
        for (name, value) in [
            ("ideal_length", self.ideal_length),
            ("max_step", self.max_step),
            ("initial_radius", self.initial_radius),
        ] {
            if value <= 0.0 {
                return Err(format!("{} must be positive, got {}", name, value));
            }
        }
        for (name, value) in [
            ("k_attract", self.k_attract),
            ("k_repel", self.k_repel),
            ("gravity", self.gravity),
            ("epsilon", self.epsilon),
        ] {
            if value < 0.0 {
                return Err(format!("{} must not be negative, got {}", name, value));
            }
        }
        Ok(())
    }

    /// Hash of the layout parameters (quantized floats).
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&QuantizedLayoutParams {
            version: self.version.clone(),
            ideal_length: quantize(self.ideal_length),
            k_attract: quantize(self.k_attract),
            k_repel: quantize(self.k_repel),
            gravity: quantize(self.gravity),
            max_step: quantize(self.max_step),
            epsilon: quantize(self.epsilon),
            max_iterations: self.max_iterations,
            initial_radius: quantize(self.initial_radius),
            origin: (quantize(self.origin.x), quantize(self.origin.y)),
            kinds: self.effective_kinds(),
        })
    }
}
