use thiserror::Error;

/// Errors that can occur while framing or parsing a wire message, shared by
/// both the client and server sides of the RPC substrate.
#[derive(Error, Debug)]
pub enum TypeError {
    #[error("bincode serialize/deserialize error {0}")]
    Bincode(#[from] bincode::Error),
    #[error("invalid magic bytes in request stream")]
    InvalidMagicBytes,
    #[error("incompatible versions, server: {server:?}, peer: {peer:?}")]
    IncompatibleVersion {
        server: crate::version::Version,
        peer: crate::version::Version,
    },
    #[error("message of {0} bytes exceeds configured maximum of {1} bytes")]
    MessageTooLarge(u64, u64),
}
