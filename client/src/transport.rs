use crate::conn::PeerConn;
use crate::error::ClientError;
use deadpool::managed::Manager;
use deadpool::managed::Metrics;
use deadpool::managed::Pool;
use deadpool::managed::RecycleError;
use deadpool::managed::RecycleResult;
use skipplus_types::node::NodeRef;
use skipplus_types::wire::Method;
use skipplus_types::wire::MethodResult;

/// Connection manager handing out, at most, one live `PeerConn` per
/// `(host, port)` at a time: the pool this manager backs is always built
/// with `max_size(1)`, so a second concurrent caller waits for the first's
/// connection to be returned rather than opening a second socket.
#[derive(Debug)]
pub struct PeerConnManager {
    host: String,
    port: u16,
}

impl PeerConnManager {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

#[async_trait::async_trait]
impl Manager for PeerConnManager {
    type Type = PeerConn;
    type Error = ClientError;

    async fn create(&self) -> Result<PeerConn, ClientError> {
        PeerConn::new(&self.host, self.port).await
    }

    async fn recycle(
        &self,
        conn: &mut PeerConn,
        _metrics: &Metrics,
    ) -> RecycleResult<ClientError> {
        conn.is_conn_valid().await.map_err(RecycleError::Backend)
    }
}

/// A client bound to a single remote peer, backed by a one-connection
/// `deadpool` pool. Used by `overlay` both for the periodic maintenance tick
/// (one peer at a time, called sequentially) and for dispatching the
/// outbound RPC queue built up while a node's state lock was held.
#[derive(Debug)]
pub struct PeerClient {
    pool: Pool<PeerConnManager>,
}

impl PeerClient {
    /// Builds a client with a fresh one-connection pool. Callers that want
    /// the "at most one live transport per peer, reused" guarantee across
    /// many call sites should go through `registry::client_for` instead of
    /// calling this directly.
    pub fn new(host: String, port: u16) -> Result<Self, ClientError> {
        let manager = PeerConnManager::new(host, port);
        let pool = Pool::builder(manager).max_size(1).build()?;
        Ok(Self { pool })
    }

    pub fn new_with_pool(pool: Pool<PeerConnManager>) -> Self {
        Self { pool }
    }

    pub async fn call(&self, method: Method) -> Result<MethodResult, ClientError> {
        let mut conn = self.pool.get().await?;
        conn.call(method).await
    }

    pub async fn get_rs(&self) -> Result<skipplus_types::node::BitString, ClientError> {
        match self.call(Method::GetRs).await? {
            MethodResult::Rs(rs) => Ok(rs),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn linearise(&self, candidate: NodeRef) -> Result<(), ClientError> {
        match self.call(Method::Linearise(candidate)).await? {
            MethodResult::Unit => Ok(()),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn search(
        &self,
        entry: skipplus_types::wire::Entry,
        op: skipplus_types::wire::SearchOp,
    ) -> Result<Option<String>, ClientError> {
        match self.call(Method::Search { entry, op }).await? {
            MethodResult::SearchResult(value) => Ok(value),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn hand_off(
        &self,
        successor: NodeRef,
    ) -> Result<std::collections::HashMap<String, String>, ClientError> {
        match self.call(Method::HandOff(successor)).await? {
            MethodResult::HandOffMap(map) => Ok(map),
            _ => Err(ClientError::UnexpectedResult),
        }
    }

    pub async fn take_over(
        &self,
        entries: std::collections::HashMap<String, String>,
    ) -> Result<(), ClientError> {
        match self.call(Method::TakeOver(entries)).await? {
            MethodResult::Unit => Ok(()),
            _ => Err(ClientError::UnexpectedResult),
        }
    }
}
