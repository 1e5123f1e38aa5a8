//! Placement of addresses onto replica nodes.
//!
//! Addresses are distributed with a modified consistent-hash rule: the
//! address hashes to a "primary" node, and the remaining copies land on
//! the next `num_replicas - 1` nodes clockwise. Every node evaluates the
//! same pure predicate, so placement needs no coordination.

const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// 32-bit FNV-1a over the UTF-8 bytes of `s`.
/// Deterministic across platforms; "HelloWorld" hashes to 926844193.
pub fn fnv1a(s: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Determine whether `node` is in the replica set of `addr` within a
/// cluster of `total_nodes`, where each address is held by `num_replicas`
/// nodes.
pub fn include_in_shard(addr: &str, node: usize, total_nodes: usize, num_replicas: usize) -> bool {
    includes(fnv1a(addr), node, total_nodes, num_replicas)
}

// The primary node is `hash % total_nodes`, and the replica set is the
// primary plus the half-open clockwise arc (primary, primary + R - 1].
// Note the asymmetric boundary: the arc test excludes its start (that is
// the primary, matched separately) and includes its end.
fn includes(hash: u32, node: usize, total_nodes: usize, num_replicas: usize) -> bool {
    if total_nodes == 1 {
        return true;
    }

    // Widening to u64 keeps the remainder non-negative regardless of the
    // hash's top bit.
    let primary = (u64::from(hash) % total_nodes as u64) as usize;
    if node == primary {
        return true;
    }
    if num_replicas == 1 {
        return false;
    }

    let start = primary;
    let end = (primary + num_replicas - 1) % total_nodes;

    if start < end {
        start < node && node <= end
    } else {
        start < node || node <= end
    }
}
