use flurry::HashSet as ConcurrentHashSet;
use skipplus_types::client::ConnectedClient;
use std::collections::HashSet as StdHashSet;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Tracks which remote peers currently have an open connection to this
/// node's RPC listener, capping the count at `maximum_clients`. Used purely
/// for observability (`InfoServer`-style introspection, logging) — it plays
/// no role in overlay membership, which is tracked separately in `N`.
#[derive(Debug)]
pub struct ClientHandler {
    clients: ConcurrentHashSet<ConnectedClient>,
    maximum_clients: usize,
}

impl ClientHandler {
    pub fn new(maximum_clients: usize) -> Self {
        Self {
            clients: ConcurrentHashSet::with_capacity(maximum_clients),
            maximum_clients,
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn connect(&self, addr: SocketAddr) -> Option<ConnectedClient> {
        let pinned = self.clients.pin();
        tracing::debug!("Current client len {}", pinned.len());
        if self.is_maxed_out() {
            tracing::warn!(
                "Maximum clients count {} reached or exceeded with {}",
                pinned.len(),
                self.maximum_clients
            );
            return None;
        };
        let client = ConnectedClient {
            address: format!("{addr}"),
            time_connected: SystemTime::now(),
        };
        pinned.insert(client.clone());
        Some(client)
    }

    #[tracing::instrument(skip(self))]
    pub fn disconnect(&self, client: &ConnectedClient) {
        let pinned = self.clients.pin();
        pinned.remove(client);
    }

    #[tracing::instrument(skip(self))]
    pub fn is_maxed_out(&self) -> bool {
        let pinned = self.clients.pin();
        pinned.len() >= self.maximum_clients
    }

    #[tracing::instrument(skip(self))]
    pub fn list(&self) -> StdHashSet<ConnectedClient> {
        let pinned = self.clients.pin();
        pinned.iter().cloned().collect()
    }
}
