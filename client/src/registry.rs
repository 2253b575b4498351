use crate::transport::PeerClient;
use crate::transport::PeerConnManager;
use deadpool::managed::Pool;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Process-wide cache of one-connection pools, keyed by `(host, port)`. The
/// RPC substrate (spec §4.2) requires at most one live transport per peer,
/// shared by every caller in this process rather than re-dialed on every
/// invocation; this registry is that sharing point, so a node's timeout tick
/// and its in-flight RPC handlers reuse the same socket to a given peer
/// instead of racing to open their own.
static POOLS: Lazy<flurry::HashMap<(String, u16), Arc<Pool<PeerConnManager>>>> =
    Lazy::new(flurry::HashMap::new);

/// Returns a `PeerClient` for `(host, port)`, creating and caching the
/// backing pool on first use.
pub fn client_for(host: &str, port: u16) -> PeerClient {
    let key = (host.to_string(), port);
    let pools = POOLS.pin();
    if let Some(pool) = pools.get(&key) {
        return PeerClient::new_with_pool((**pool).clone());
    }
    let manager = PeerConnManager::new(host.to_string(), port);
    let pool = Pool::builder(manager)
        .max_size(1)
        .build()
        .expect("building a one-connection deadpool pool cannot fail without a runtime-only option set");
    pools.insert(key, Arc::new(pool.clone()));
    PeerClient::new_with_pool(pool)
}
