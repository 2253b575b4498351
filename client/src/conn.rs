use crate::error::ClientError;
use skipplus_types::bincode::BinCodeSerAndDeser;
use skipplus_types::bincode::LENGTH_HEADER_SIZE;
use skipplus_types::bincode::MAGIC_BYTES;
use skipplus_types::bincode::VERSION_LENGTH;
use skipplus_types::version::Version;
use skipplus_types::version::VERSION;
use skipplus_types::wire::RpcRequest;
use skipplus_types::wire::RpcResponse;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// A raw TCP connection to a single remote peer's RPC listener. One
/// `PeerConn` speaks the framed request/response protocol described in
/// `skipplus_types::bincode`: requests and responses are both tagged with a
/// correlation id so a caller can detect a mismatched reply, even though in
/// practice this connection is used strictly half-duplex (one outstanding
/// request at a time per connection, per the pool's `max_size(1)`).
#[derive(Debug)]
pub struct PeerConn {
    stream: TcpStream,
    next_correlation_id: AtomicU64,
}

impl PeerConn {
    pub(crate) async fn new(host: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(format!("{host}:{port}")).await?;
        Ok(Self {
            stream,
            next_correlation_id: AtomicU64::new(0),
        })
    }

    pub(crate) async fn is_conn_valid(&mut self) -> Result<(), ClientError> {
        self.call(skipplus_types::wire::Method::GetRs).await?;
        Ok(())
    }

    pub(crate) async fn call(
        &mut self,
        method: skipplus_types::wire::Method,
    ) -> Result<skipplus_types::wire::MethodResult, ClientError> {
        let correlation_id = self.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            correlation_id,
            method,
        };
        let serialized = request.serialize()?;
        self.stream.write_all(&serialized).await?;
        let response: RpcResponse = self.read_framed().await?;
        if response.correlation_id != correlation_id {
            return Err(ClientError::CorrelationMismatch {
                expected: correlation_id,
                got: response.correlation_id,
            });
        }
        Ok(response.result?)
    }

    async fn read_framed<T: for<'a> BinCodeSerAndDeser<'a>>(&mut self) -> Result<T, ClientError> {
        let mut magic_bytes_buf = [0u8; MAGIC_BYTES.len()];
        self.stream.read_exact(&mut magic_bytes_buf).await?;
        if magic_bytes_buf != MAGIC_BYTES {
            return Err(ClientError::Io(std::io::Error::other(
                "invalid magic bytes in response stream",
            )));
        }
        let mut version_buf = [0u8; VERSION_LENGTH];
        self.stream.read_exact(&mut version_buf).await?;
        let version = Version::deserialize_magic_bytes(&version_buf)?;
        if !VERSION.is_compatible(&version) {
            return Err(ClientError::Io(std::io::Error::other(format!(
                "incompatible peer version {version:?}, expected compatible with {:?}",
                *VERSION
            ))));
        }
        let mut length_buf = [0u8; LENGTH_HEADER_SIZE];
        self.stream.read_exact(&mut length_buf).await?;
        let data_length = u64::from_be_bytes(length_buf);
        let mut payload = vec![0u8; data_length as usize];
        self.stream.read_exact(&mut payload).await?;
        Ok(T::deserialize(&payload)?)
    }
}
