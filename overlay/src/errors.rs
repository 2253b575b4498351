use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("std io error {0}")]
    Io(#[from] std::io::Error),
    #[error("client error talking to peer: {0}")]
    Client(#[from] skipplus_client::error::ClientError),
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Surfaces a delegation/bootstrap failure to a caller waiting on an RPC
/// response, per the §7 propagation policy for user-initiated operations.
impl From<OverlayError> for skipplus_types::wire::RemoteError {
    fn from(err: OverlayError) -> Self {
        let kind = match &err {
            OverlayError::Io(_) => "io",
            OverlayError::Client(_) => "client",
        };
        Self {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}
