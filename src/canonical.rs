//! Canonical serialization for deterministic hashing.
//!
//! Snapshot ids, document content hashes, layout parameter hashes and
//! layout fingerprints are all xxh64 digests of canonical JSON.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap in hashed data: use BTreeMap or sorted Vecs
//! - No raw floats in hashed data: quantize with [`quantize`] first

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Quantization factor for floats that take part in a hash.
/// Floats are multiplied by this value and rounded to i64.
pub const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Quantize a float to an i64 (resolution 1e-6) for deterministic hashing.
///
/// Non-finite values map to fixed sentinels so they still hash stably.
pub fn quantize(value: f64) -> i64 {
    if value.is_nan() {
        i64::MIN
    } else {
        (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
    }
}

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Every type hashed by this crate serializes infallibly (no maps with
/// non-string keys, no raw floats); a failure yields an empty buffer.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return it as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        label: String,
        x: i64,
    }

    #[test]
    fn test_hash_is_stable() {
        let s = Sample {
            label: "a".to_string(),
            x: quantize(0.5),
        };
        assert_eq!(canonical_hash(&s), canonical_hash(&s));
        assert_eq!(canonical_hash_hex(&s).len(), 16);
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(1.0), 1_000_000);
        assert_eq!(quantize(-0.0000004), 0);
        assert_eq!(quantize(0.0000006), 1);
        assert_eq!(quantize(f64::NAN), i64::MIN);
    }
}
