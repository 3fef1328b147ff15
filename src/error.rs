/// Errors produced by FIFO operations.
///
/// Mirrors the status codes of the original C core (`QUEUE_FULL`,
/// `OUT_OF_MEMORY`, `INVALID_ARGUMENT`); `OK`/`AGAIN` are represented
/// separately by [`crate::Status`] since they aren't really error conditions.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("queue is full")]
    QueueFull,

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl Error {
    #[cold]
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Error {
        Error::InvalidArgument {
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
