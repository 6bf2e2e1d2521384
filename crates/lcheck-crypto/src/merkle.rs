use lcheck_types::Hash256;

/// Root of a binary Merkle tree over `leaves`, in the given order.
///
/// An empty list produces the all-zero hash. A single leaf is its own root.
/// Odd nodes on a level are paired with themselves.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::default();
    }

    let mut current = leaves.to_vec();
    while current.len() > 1 {
        current = current
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [odd] => hash_pair(odd, odd),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }
    current[0]
}

fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"lcheck-merkle-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash256::new(*hasher.finalize().as_bytes())
}
