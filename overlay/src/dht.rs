//! `HashNode`: a `SkipNode` extended with the distributed hash table layer.
//! Key ownership follows the projection onto `[0, 1)`: a node owns the keys
//! in `(pred(self).unit_id(), self.unit_id()]`. `pred`/`succ` are
//! recomputed on every `linearise`, so `search` always delegates against a
//! fresh view of the ring.
use crate::algebra;
use crate::errors::OverlayResult;
use crate::skip::SkipNode;
use skipplus_client::registry;
use skipplus_types::node::{NodeRef, PeerRef};
use skipplus_types::wire::{Entry, SearchOp};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug)]
struct DhtState {
    local_hash_table: HashMap<String, String>,
    pred: PeerRef,
    succ: PeerRef,
}

#[derive(Debug)]
pub struct HashNode {
    skip: SkipNode,
    state: Mutex<DhtState>,
}

impl HashNode {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            skip: SkipNode::new(host, port),
            state: Mutex::new(DhtState {
                local_hash_table: HashMap::new(),
                pred: PeerRef::Lowest,
                succ: PeerRef::Highest,
            }),
        }
    }

    pub fn reference(&self) -> NodeRef {
        self.skip.reference()
    }

    pub fn rs(&self) -> skipplus_types::node::BitString {
        self.skip.rs()
    }

    /// Snapshot of the current neighborhood, for introspection/tests.
    pub async fn neighborhood(&self) -> std::collections::HashSet<NodeRef> {
        self.skip.neighborhood().await
    }

    /// `SkipNode::linearise` plus recomputing `pred`/`succ` and, if our
    /// predecessor changed (to a real node), pulling the entries that are
    /// now ours from it.
    #[tracing::instrument(skip(self))]
    pub async fn linearise(&self, u: NodeRef) {
        self.skip.linearise(u).await;

        let neighborhood = self.skip.neighborhood().await;
        let self_ref = self.skip.reference();
        let new_pred = algebra::pred(&self_ref, &neighborhood);
        let new_succ = algebra::succ(&self_ref, &neighborhood);

        let handoff_source = {
            let mut state = self.state.lock().await;
            let old_pred = state.pred.clone();
            state.pred = new_pred.clone();
            state.succ = new_succ;
            if new_pred != old_pred {
                new_pred.as_node().cloned()
            } else {
                None
            }
        };

        if let Some(pred_node) = handoff_source {
            let client = registry::client_for(&pred_node.host, pred_node.port);
            match client.hand_off(self_ref).await {
                Ok(entries) => {
                    let mut state = self.state.lock().await;
                    state.local_hash_table.extend(entries);
                }
                Err(e) => {
                    tracing::warn!("hand_off from new predecessor {pred_node:?} failed: {e}");
                }
            }
        }
    }

    /// Delegates to whichever node is responsible for `entry.key`, applying
    /// `op` once the request reaches it. There are no cyclic edges in this
    /// implementation, so a node whose `pred`/`succ` is still a sentinel
    /// treats "falls off that end of the range" as "mine". A transport or
    /// remote failure on a delegated hop is surfaced to the caller rather
    /// than folded into a lookup miss, per the propagation policy for
    /// user-initiated operations.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, entry: Entry, op: SearchOp) -> OverlayResult<Option<String>> {
        let self_ref = self.skip.reference();
        let unit_id = self_ref.unit_id();
        let unit_key = unit_key_hash(&entry.key);

        let (pred, succ, neighborhood) = {
            let state = self.state.lock().await;
            (
                state.pred.clone(),
                state.succ.clone(),
                self.skip.neighborhood().await,
            )
        };

        if matches!(pred, PeerRef::Lowest) && unit_key < unit_id {
            return Ok(self.process_locally(entry, op).await);
        }
        if matches!(succ, PeerRef::Highest) && unit_key > unit_id {
            return Ok(self.process_locally(entry, op).await);
        }

        let pred_bound = peer_unit_bound(&pred);
        let succ_bound = peer_unit_bound(&succ);
        let in_range = pred_bound <= unit_key && unit_key <= succ_bound;
        if !in_range {
            let next = if unit_key < pred_bound {
                neighborhood
                    .iter()
                    .filter(|x| x.unit_id() > unit_key)
                    .min()
                    .cloned()
            } else {
                neighborhood
                    .iter()
                    .filter(|x| x.unit_id() < unit_key)
                    .max()
                    .cloned()
            };
            return match next {
                Some(target) => self.delegate(&target, entry, op).await,
                None => Ok(self.process_locally(entry, op).await),
            };
        }

        if unit_key < unit_id {
            match pred.as_node() {
                Some(pred_node) => self.delegate(&pred_node.clone(), entry, op).await,
                None => Ok(self.process_locally(entry, op).await),
            }
        } else {
            Ok(self.process_locally(entry, op).await)
        }
    }

    async fn delegate(
        &self,
        target: &NodeRef,
        entry: Entry,
        op: SearchOp,
    ) -> OverlayResult<Option<String>> {
        let client = registry::client_for(&target.host, target.port);
        client.search(entry, op).await.map_err(|e| {
            tracing::warn!("search delegation to {target:?} failed: {e}");
            e.into()
        })
    }

    async fn process_locally(&self, entry: Entry, op: SearchOp) -> Option<String> {
        let mut state = self.state.lock().await;
        match op {
            SearchOp::Lookup => state.local_hash_table.get(&entry.key).cloned(),
            SearchOp::Insert => {
                state.local_hash_table.insert(entry.key, entry.value);
                None
            }
            SearchOp::Delete => {
                state.local_hash_table.remove(&entry.key);
                None
            }
        }
    }

    /// Entries whose key hash falls at or past `successor`'s position:
    /// removed from this node's table and returned for the caller (a
    /// joining node) to take over.
    #[tracing::instrument(skip(self))]
    pub async fn hand_off(&self, successor: NodeRef) -> HashMap<String, String> {
        let boundary = successor.unit_id();
        let mut state = self.state.lock().await;
        let keys: Vec<String> = state
            .local_hash_table
            .keys()
            .filter(|k| unit_key_hash(k) >= boundary)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|k| state.local_hash_table.remove(&k).map(|v| (k, v)))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    pub async fn take_over(&self, entries: HashMap<String, String>) {
        self.state.lock().await.local_hash_table.extend(entries);
    }

    pub async fn timeout(&self) {
        self.skip.timeout().await;
    }

    /// Hands every remaining local entry off to our predecessor, if we
    /// have a real one, before leaving the ring.
    pub async fn shutdown(&self) {
        let (pred, entries) = {
            let mut state = self.state.lock().await;
            (
                state.pred.as_node().cloned(),
                std::mem::take(&mut state.local_hash_table),
            )
        };
        if let Some(pred_node) = pred {
            let client = registry::client_for(&pred_node.host, pred_node.port);
            if let Err(e) = client.take_over(entries).await {
                tracing::warn!("take_over handoff to {pred_node:?} on shutdown failed: {e}");
            }
        }
    }
}

/// `pred`/`succ` on the unit interval: a sentinel extends the interval's
/// bound to infinity so every real key compares inside it.
fn peer_unit_bound(peer: &PeerRef) -> f64 {
    match peer {
        PeerRef::Lowest => f64::NEG_INFINITY,
        PeerRef::Highest => f64::INFINITY,
        PeerRef::Node(n) => n.unit_id(),
    }
}

/// Projection of a key's blake3 hash onto `[0, 1)`, used for DHT key
/// ownership. Grounded on the same non-cryptographic hashing choice as
/// `skipplus_types::node::node_id`.
fn unit_key_hash(key: &str) -> f64 {
    let digest = blake3::hash(key.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_be_bytes(buf) as f64) / (u64::MAX as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_lone_node_with_no_neighbors_owns_every_key() {
        let node = HashNode::new("127.0.0.1", 9101);
        let entry = Entry {
            key: "hello".into(),
            value: "world".into(),
        };
        assert_eq!(
            node.search(entry.clone(), SearchOp::Lookup).await.unwrap(),
            None
        );
        node.search(entry.clone(), SearchOp::Insert).await.unwrap();
        assert_eq!(
            node.search(entry, SearchOp::Lookup).await.unwrap(),
            Some("world".to_string())
        );
    }

    #[tokio::test]
    async fn lookup_after_delete_on_a_lone_node_returns_none() {
        let node = HashNode::new("127.0.0.1", 9104);
        let entry = Entry {
            key: "ephemeral".into(),
            value: "gone-soon".into(),
        };
        node.search(entry.clone(), SearchOp::Insert).await.unwrap();
        node.search(entry.clone(), SearchOp::Delete).await.unwrap();
        assert_eq!(node.search(entry, SearchOp::Lookup).await.unwrap(), None);
    }

    #[tokio::test]
    async fn hand_off_only_returns_entries_at_or_past_the_boundary() {
        let node = HashNode::new("127.0.0.1", 9102);
        {
            let mut state = node.state.lock().await;
            state
                .local_hash_table
                .insert("a".to_string(), "1".to_string());
            state
                .local_hash_table
                .insert("b".to_string(), "2".to_string());
        }
        let successor = NodeRef::new(
            "127.0.0.1",
            9103,
            skipplus_types::node::BitString::random(skipplus_types::node::RS_BYTE_LENGTH),
        );
        let handed_off = node.hand_off(successor.clone()).await;
        let boundary = successor.unit_id();
        for (key, _) in &handed_off {
            assert!(unit_key_hash(key) >= boundary);
        }
    }
}
