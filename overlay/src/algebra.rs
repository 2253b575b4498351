//! Pure functions over a node's random bit string and neighborhood, with no
//! knowledge of sockets or concurrency. `overlay::skip` and `overlay::dht`
//! call these while holding a node's state lock; none of them perform I/O.
use skipplus_types::node::BitString;
use skipplus_types::node::NodeRef;
use skipplus_types::node::PeerRef;
use std::collections::HashSet;

/// The first `i` bits of `v`'s random bit string.
pub fn prefix(i: usize, v: &NodeRef) -> Vec<bool> {
    v.rs.prefix(i)
}

/// `pred(v, W) = arg max {w ∈ W ∪ {lowest} | w < v}`
pub fn pred(v: &NodeRef, w: &HashSet<NodeRef>) -> PeerRef {
    w.iter()
        .filter(|cand| *cand < v)
        .cloned()
        .map(PeerRef::Node)
        .max()
        .unwrap_or(PeerRef::Lowest)
}

/// `succ(v, W) = arg min {w ∈ W ∪ {highest} | w > v}`
pub fn succ(v: &NodeRef, w: &HashSet<NodeRef>) -> PeerRef {
    w.iter()
        .filter(|cand| *cand > v)
        .cloned()
        .map(PeerRef::Node)
        .min()
        .unwrap_or(PeerRef::Highest)
}

/// `{w ∈ N | prefix(i+1, w) = prefix(i, v)◦x}`
fn level_nodes(i: usize, v: &NodeRef, x: bool, n: &HashSet<NodeRef>) -> HashSet<NodeRef> {
    let mut wanted = v.rs.prefix(i);
    wanted.push(x);
    n.iter()
        .filter(|w| w.rs.prefix(i + 1) == wanted)
        .cloned()
        .collect()
}

pub fn level_pred(i: usize, v: &NodeRef, x: bool, n: &HashSet<NodeRef>) -> PeerRef {
    pred(v, &level_nodes(i, v, x, n))
}

pub fn level_succ(i: usize, v: &NodeRef, x: bool, n: &HashSet<NodeRef>) -> PeerRef {
    succ(v, &level_nodes(i, v, x, n))
}

/// `low(i, v, N) = min{levelPred(i, v, 0, N), levelPred(i, v, 1, N)}`
pub fn low(i: usize, v: &NodeRef, n: &HashSet<NodeRef>) -> PeerRef {
    level_pred(i, v, false, n).min(level_pred(i, v, true, n))
}

/// `high(i, v, N) = max{levelSucc(i, v, 0, N), levelSucc(i, v, 1, N)}`
pub fn high(i: usize, v: &NodeRef, n: &HashSet<NodeRef>) -> PeerRef {
    level_succ(i, v, false, n).max(level_succ(i, v, true, n))
}

/// `range(i, v, N) = {w ∈ N | prefix(i, w) = prefix(i, v), low(i,v,N) <= w <= high(i,v,N)}`
pub fn range(i: usize, v: &NodeRef, n: &HashSet<NodeRef>) -> HashSet<NodeRef> {
    let v_prefix = v.rs.prefix(i);
    let lo = low(i, v, n);
    let hi = high(i, v, n);
    n.iter()
        .filter(|w| w.rs.prefix(i) == v_prefix && **w >= lo && **w <= hi)
        .cloned()
        .collect()
}

/// `{w ∈ nodes | prefix(i, w) = prefix(i, v)}`
pub fn filter_by_prefix(i: usize, v: &NodeRef, nodes: &HashSet<NodeRef>) -> HashSet<NodeRef> {
    let v_prefix = v.rs.prefix(i);
    nodes
        .iter()
        .filter(|w| w.rs.prefix(i) == v_prefix)
        .cloned()
        .collect()
}

/// Length of the longest common prefix of two random bit strings.
pub fn common_prefix_length(v: &BitString, w: &BitString) -> usize {
    let len = v.bit_len().min(w.bit_len());
    (0..len).take_while(|&i| v.bit(i) == w.bit(i)).count()
}

/// The subset of `nodes` sharing the longest common random-bit-string
/// prefix with `w`. Used to pick a delegation target for an undesirable
/// neighbor: among the ties, the caller picks the one closest by id.
pub fn longest_common_prefix_nodes(w: &NodeRef, nodes: &HashSet<NodeRef>) -> HashSet<NodeRef> {
    let longest = nodes
        .iter()
        .map(|x| common_prefix_length(&x.rs, &w.rs))
        .max()
        .unwrap_or(0);
    let wanted = w.rs.prefix(longest);
    nodes
        .iter()
        .filter(|x| x.rs.prefix(longest) == wanted)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str, port: u16, rs: &[u8]) -> NodeRef {
        NodeRef::new(host, port, BitString::from_bytes(rs.to_vec()))
    }

    #[test]
    fn pred_and_succ_fall_back_to_sentinels_on_empty_neighborhood() {
        let v = node("a", 1, &[0, 0]);
        let empty = HashSet::new();
        assert_eq!(pred(&v, &empty), PeerRef::Lowest);
        assert_eq!(succ(&v, &empty), PeerRef::Highest);
    }

    #[test]
    fn pred_is_the_largest_smaller_neighbor() {
        let v = node("v", 100, &[0, 0]);
        let smaller = node("s", 10, &[0, 0]);
        let larger = node("l", 999, &[0, 0]);
        let n = HashSet::from_iter([smaller.clone(), larger]);
        assert_eq!(pred(&v, &n), PeerRef::Node(smaller));
    }

    #[test]
    fn common_prefix_length_counts_matching_leading_bits() {
        let a = BitString::from_bytes(vec![0b1010_0000]);
        let b = BitString::from_bytes(vec![0b1011_0000]);
        assert_eq!(common_prefix_length(&a, &b), 3);
    }

    #[test]
    fn range_only_keeps_nodes_sharing_the_prefix_and_within_bounds() {
        let v = node("v", 1, &[0b0000_0000, 0]);
        let close = node("close", 2, &[0b0000_0001, 0]);
        let far_prefix = node("far", 3, &[0b1111_1111, 0]);
        let n = HashSet::from_iter([close.clone(), far_prefix]);
        let r = range(1, &v, &n);
        assert!(r.contains(&close));
        assert_eq!(r.len(), 1);
    }
}
