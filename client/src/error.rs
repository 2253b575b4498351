use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("std io error {0}")]
    Io(#[from] std::io::Error),
    #[error("bincode serialize/deserialize error {0}")]
    Bincode(#[from] bincode::Error),
    #[error("remote peer returned an error: {0}")]
    Remote(#[from] skipplus_types::wire::RemoteError),
    #[error("response correlation id {got} did not match request {expected}")]
    CorrelationMismatch { expected: u64, got: u64 },
    #[error("response carried an unexpected result variant for the request sent")]
    UnexpectedResult,
    #[error("deadpool error {0}")]
    Pool(String),
}

impl<E: std::fmt::Debug> From<deadpool::managed::PoolError<E>> for ClientError {
    fn from(input: deadpool::managed::PoolError<E>) -> Self {
        Self::Pool(format!("{input:?}"))
    }
}

impl From<deadpool::managed::BuildError> for ClientError {
    fn from(input: deadpool::managed::BuildError) -> Self {
        Self::Pool(format!("{input}"))
    }
}
