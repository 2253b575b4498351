//! The RPC substrate's server side: a `TcpListener` accepting one
//! connection per remote peer, stripping the magic-bytes/version/length
//! framing off each message, and dispatching the decoded `Method` to the
//! node running underneath. Grounded on the accept-loop-plus-shutdown-guard
//! shape used for the DB listener, generalized from one fixed query type to
//! the five-method RPC substrate.
use skipplus_types::bincode::BinCodeSerAndDeser;
use skipplus_types::bincode::LENGTH_HEADER_SIZE;
use skipplus_types::bincode::MAGIC_BYTES;
use skipplus_types::bincode::VERSION_LENGTH;
use skipplus_types::client::ConnectedClient;
use skipplus_types::errors::TypeError;
use skipplus_types::version::Version;
use skipplus_types::version::VERSION;
use skipplus_types::wire::{Method, MethodResult, RemoteError, RpcRequest, RpcResponse};
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::select;
use tokio_graceful::Shutdown;
use tokio_graceful::ShutdownGuard;
use utils::client::ClientHandler;

use crate::dht::HashNode;

/// Accepts connections for a single running `HashNode` and dispatches RPCs
/// against it until shut down.
pub struct Listener {
    listener: TcpListener,
    node: Arc<HashNode>,
    client_handler: Arc<ClientHandler>,
    shutdown_token: Shutdown,
    maximum_message_size: u64,
}

impl Listener {
    pub async fn bind(
        host: &str,
        port: u16,
        node: Arc<HashNode>,
        maximum_clients: usize,
        maximum_message_size: u64,
    ) -> IoResult<Self> {
        let listener = TcpListener::bind(format!("{host}:{port}")).await?;
        Ok(Self {
            listener,
            node,
            client_handler: Arc::new(ClientHandler::new(maximum_clients)),
            shutdown_token: Shutdown::default(),
            maximum_message_size,
        })
    }

    pub fn local_addr(&self) -> IoResult<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `cancellation_token` (shared with the
    /// owning node's maintenance tick) fires, then drains in-flight
    /// connections with a bounded grace period before returning.
    pub async fn serve(self) -> IoResult<()> {
        loop {
            let shutdown_guard = self.shutdown_token.guard();
            select! {
                _ = shutdown_guard.cancelled() => {
                    drop(shutdown_guard);
                    self.shutdown().await;
                    break Ok(());
                }
                Ok((stream, addr)) = self.listener.accept() => {
                    tracing::info!("accepted connection from {addr}");
                    let connected_client = self.client_handler.connect(addr);
                    let mut task = ConnectionTask {
                        reader: BufReader::new(stream),
                        node: self.node.clone(),
                        client_handler: self.client_handler.clone(),
                        connected_client,
                        maximum_message_size: self.maximum_message_size,
                    };
                    shutdown_guard.spawn_task_fn(|guard| async move {
                        if let Err(e) = task.process(guard).await {
                            tracing::error!("connection error: {e}");
                        }
                    });
                }
            }
        }
    }

    async fn shutdown(self) {
        if self
            .shutdown_token
            .shutdown_with_limit(Duration::from_secs(10))
            .await
            .is_err()
        {
            tracing::error!("listener shutdown took longer than timeout");
        }
    }
}

#[derive(Debug)]
struct ConnectionTask {
    reader: BufReader<TcpStream>,
    node: Arc<HashNode>,
    client_handler: Arc<ClientHandler>,
    connected_client: Option<ConnectedClient>,
    maximum_message_size: u64,
}

impl ConnectionTask {
    async fn process(&mut self, shutdown_guard: ShutdownGuard) -> IoResult<()> {
        let mut magic_bytes_buf = [0u8; MAGIC_BYTES.len()];
        let mut version_buf = [0u8; VERSION_LENGTH];
        let mut length_buf = [0u8; LENGTH_HEADER_SIZE];

        loop {
            select! {
                _ = shutdown_guard.cancelled() => {
                    tracing::debug!("cancelling stream as server is shutting down");
                    break;
                }
                res = self.reader.read_exact(&mut magic_bytes_buf) => {
                    match res {
                        Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                            tracing::debug!("peer hung up");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("error reading from stream: {e}");
                            break;
                        }
                        Ok(_) => {
                            if magic_bytes_buf != MAGIC_BYTES {
                                return Err(std::io::Error::other(TypeError::InvalidMagicBytes));
                            }
                            self.reader.read_exact(&mut version_buf).await?;
                            let version = Version::deserialize_magic_bytes(&version_buf)
                                .map_err(TypeError::Bincode)
                                .map_err(std::io::Error::other)?;
                            if !VERSION.is_compatible(&version) {
                                return Err(std::io::Error::other(TypeError::IncompatibleVersion {
                                    server: *VERSION,
                                    peer: version,
                                }));
                            }
                            self.reader.read_exact(&mut length_buf).await?;
                            let data_length = u64::from_be_bytes(length_buf);
                            if data_length > self.maximum_message_size {
                                tracing::error!(
                                    "{}",
                                    TypeError::MessageTooLarge(data_length, self.maximum_message_size)
                                );
                                break;
                            }
                            let mut data = vec![0u8; data_length as usize];
                            self.reader.read_exact(&mut data).await?;
                            match RpcRequest::deserialize(&data) {
                                Ok(request) => {
                                    let response = self.handle(request).await;
                                    if let Ok(bytes) = response.serialize() {
                                        self.reader.get_mut().write_all(&bytes).await?;
                                    }
                                }
                                Err(e) => {
                                    tracing::error!("could not deserialize request: {e}");
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let correlation_id = request.correlation_id;
        let result = self.dispatch(request.method).await;
        RpcResponse {
            correlation_id,
            result,
        }
    }

    async fn dispatch(&self, method: Method) -> Result<MethodResult, RemoteError> {
        match method {
            Method::GetRs => Ok(MethodResult::Rs(self.node.rs())),
            Method::Linearise(u) => {
                self.node.linearise(u).await;
                Ok(MethodResult::Unit)
            }
            Method::Search { entry, op } => self
                .node
                .search(entry, op)
                .await
                .map(MethodResult::SearchResult)
                .map_err(RemoteError::from),
            Method::HandOff(successor) => {
                Ok(MethodResult::HandOffMap(self.node.hand_off(successor).await))
            }
            Method::TakeOver(entries) => {
                self.node.take_over(entries).await;
                Ok(MethodResult::Unit)
            }
        }
    }
}

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        if let Some(client) = &self.connected_client {
            self.client_handler.disconnect(client);
        }
    }
}
