use std::hash::{Hash, Hasher};

use serde_json::Value;

/// Wraps a `serde_json::Value` so it can be hashed and compared for equality despite
/// `Value` not implementing `Hash` (floats). Used by per-kind caches (spec 4.D) to
/// detect whether a re-rendered object's metric lines actually changed before
/// touching the scrape buffer.
#[derive(Debug, Clone)]
pub struct HashableJsonValue<'a>(pub &'a Value);

impl Hash for HashableJsonValue<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(self.0, state);
    }
}

impl PartialEq for HashableJsonValue<'_> {
    fn eq(&self, other: &Self) -> bool {
        ordered_eq(self.0, other.0)
    }
}

impl Eq for HashableJsonValue<'_> {}

fn hash_value<H: Hasher>(v: &Value, state: &mut H) {
    match v {
        Value::Null => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        },
        Value::Number(n) => {
            state.write_u8(2);
            n.to_string().hash(state);
        },
        Value::String(s) => {
            state.write_u8(3);
            s.hash(state);
        },
        Value::Array(items) => {
            state.write_u8(4);
            for item in items {
                hash_value(item, state);
            }
        },
        Value::Object(map) => {
            state.write_u8(5);
            // serde_json::Map iterates in key order when the `preserve_order` feature
            // is disabled, which keeps this hash stable across re-renders of the same
            // logical object.
            for (k, v) in map {
                k.hash(state);
                hash_value(v, state);
            }
        },
    }
}

/// Order-independent-looking but implementation-stable deep equality (relies on the
/// same key-ordering guarantee as [`hash_value`]).
pub fn ordered_eq(a: &Value, b: &Value) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use rstest::*;
    use serde_json::json;

    use super::*;

    fn hash_of(v: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        HashableJsonValue(v).hash(&mut hasher);
        hasher.finish()
    }

    #[rstest]
    fn test_hash_stable_across_key_order() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[rstest]
    fn test_hash_differs_on_value_change() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(hash_of(&a), hash_of(&b));
    }

    #[rstest]
    fn test_ordered_eq() {
        assert!(ordered_eq(&json!({"a": 1}), &json!({"a": 1})));
        assert!(!ordered_eq(&json!({"a": 1}), &json!({"a": 2})));
    }
}
