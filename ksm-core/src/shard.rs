use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Jump consistent hash (Lamping & Veach): maps a 64-bit key onto one of
/// `num_buckets` buckets such that, as `num_buckets` grows, only a minimal
/// fraction of keys move. Used by the watch driver's sharding filter (spec 4.I).
pub fn jump_consistent_hash(mut key: u64, num_buckets: i32) -> i32 {
    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < num_buckets as i64 {
        b = j;
        key = key.wrapping_mul(2862933555777941757).wrapping_add(1);
        j = ((b.wrapping_add(1)) as f64 * ((1i64 << 31) as f64 / (((key >> 33).wrapping_add(1)) as f64))) as i64;
    }
    b as i32
}

pub fn hash64(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Decides whether this process owns `uid` given its shard index/count (spec 4.I).
/// `shard_count == 1` always returns true, so the unsharded case retains every
/// object (spec 8, invariant 4).
pub fn owns(uid: &str, shard_index: i32, shard_count: i32) -> bool {
    if shard_count <= 1 {
        return true;
    }
    jump_consistent_hash(hash64(uid), shard_count) == shard_index
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use rstest::*;

    use super::*;

    #[rstest]
    fn test_unsharded_retains_everything() {
        for uid in ["a", "b", "some-uid", ""] {
            assert!(owns(uid, 0, 1));
        }
    }

    #[rstest]
    fn test_partition_is_disjoint_and_covers_all() {
        let uids: Vec<String> = (0..200).map(|i| format!("uid-{i}")).collect();
        let shard_count = 3;
        let mut owner_of: HashMap<&str, i32> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for uid in &uids {
            let mut owners = vec![];
            for shard_index in 0..shard_count {
                if owns(uid, shard_index, shard_count) {
                    owners.push(shard_index);
                }
            }
            assert_eq!(owners.len(), 1, "uid {uid} must be owned by exactly one shard");
            owner_of.insert(uid, owners[0]);
            seen.insert(uid);
        }
        assert_eq!(seen.len(), uids.len());
    }

    #[rstest]
    fn test_stable_for_same_input() {
        assert_eq!(jump_consistent_hash(42, 5), jump_consistent_hash(42, 5));
    }
}
