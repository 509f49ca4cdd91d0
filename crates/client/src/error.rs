//! Client error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The background client task has shut down; no further operations
    /// will be delivered.
    #[error("client task is no longer running")]
    ClientGone,

    /// A query reply channel was dropped before the actor answered.
    #[error("client task dropped the reply channel")]
    ReplyDropped,
}
