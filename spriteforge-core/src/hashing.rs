//! Hashing System - SHA-256 for artifacts and animation ids
//!
//! Provides deterministic hashes that are stable across runs and platforms.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::{Value, to_string};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(sort_value).collect())
        }
        _ => v.clone()
    }
}

/// Content hash of an artifact, over its canonical JSON
pub fn artifact_hash<T: Serialize>(artifact: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(artifact)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Animation id driven through the controller's int parameter.
/// anim_id = first 4 bytes (big-endian) of sha256(lowercase(name))
pub fn anim_id(animation: &str) -> i32 {
    let digest = Sha256::digest(animation.to_lowercase().as_bytes());
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Pairs of distinct names (case-insensitively) that map to the same id.
pub fn anim_id_collisions<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<(String, String, i32)> {
    let mut seen: Vec<(&str, i32)> = vec![];
    let mut collisions = vec![];

    for name in names {
        let id = anim_id(name);
        for (other, other_id) in &seen {
            if *other_id == id && other.to_lowercase() != name.to_lowercase() {
                collisions.push((other.to_string(), name.to_string(), id));
            }
        }
        seen.push((name, id));
    }

    collisions
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
