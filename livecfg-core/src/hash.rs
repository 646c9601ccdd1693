//! Content hashing for change detection.
//!
//! Values are hashed over a canonical JSON rendering: object keys sorted,
//! no insignificant whitespace, strings escaped by `serde_json`. Two values
//! that are equal as [`LiveValue`]s always produce the same [`StateHash`],
//! whatever order their source emitted object keys in.

use crate::LiveValue;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a value's canonical form, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateHash(String);

impl StateHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a value's canonical form.
pub fn state_hash(value: &LiveValue) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    StateHash(hex::encode(hasher.finalize()))
}

/// Deterministic JSON rendering with recursively sorted object keys.
pub fn canonical_json(value: &LiveValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &LiveValue, out: &mut String) {
    match value {
        LiveValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        LiveValue::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&LiveValue::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [true, null], "y": "s"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"y":"s","z":[true,null]},"b":1}"#
        );
    }

    #[test]
    fn test_state_hash_is_hex_sha256() {
        let hash = state_hash(&json!("localhost"));
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_state_hash_distinguishes_types() {
        assert_ne!(state_hash(&json!(1)), state_hash(&json!("1")));
        assert_ne!(state_hash(&json!(null)), state_hash(&json!("null")));
    }

    #[test]
    fn test_key_order_does_not_change_hash() {
        let a: LiveValue = serde_json::from_str(r#"{"host":"db","port":5432}"#).unwrap();
        let b: LiveValue = serde_json::from_str(r#"{"port":5432,"host":"db"}"#).unwrap();
        assert_eq!(state_hash(&a), state_hash(&b));
    }

    proptest! {
        #[test]
        fn prop_hash_is_deterministic(s in ".*", n in any::<i64>()) {
            let value = json!({"s": s, "n": n});
            prop_assert_eq!(state_hash(&value), state_hash(&value.clone()));
        }

        #[test]
        fn prop_different_strings_hash_differently(a in "[a-z]{1,16}", b in "[a-z]{1,16}") {
            prop_assume!(a != b);
            prop_assert_ne!(state_hash(&json!(a)), state_hash(&json!(b)));
        }
    }
}
