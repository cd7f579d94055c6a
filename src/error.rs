//! Error taxonomy for a transfer session

use std::path::PathBuf;

/// Everything that can go wrong during a LIST or GET session.
///
/// None of these are retried. The session is abandoned, both connections are closed,
/// and the error is surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The control or data socket could not be established
    #[error("could not connect {what}: {source}")]
    Connection {
        /// Which connection, and to or from where
        what: String,
        /// The underlying cause
        #[source]
        source: std::io::Error,
    },

    /// Malformed or out-of-sequence traffic
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer closed the stream before a declared length was satisfied
    #[error("connection closed early (received {received} of {expected} bytes)")]
    ConnectionClosed {
        /// Bytes we were told to expect
        expected: u64,
        /// Bytes that actually arrived
        received: u64,
    },

    /// A network operation did not complete within the configured timeout
    #[error("timed out {0}")]
    Timeout(&'static str),

    /// The server did not understand the command (`UNK_CMD`)
    #[error("server received unknown command")]
    RemoteRejected,

    /// The server could not open the requested file (`FAIL` after `GET_REPLY`)
    #[error("file not found on server: {0}")]
    RemoteNotFound(String),

    /// The destination file already exists locally; we never overwrite
    #[error("filename is taken: {} already exists", .0.display())]
    LocalFileExists(PathBuf),

    /// Local or network I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Was this failure reported by the server (as opposed to detected locally)?
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteRejected | Self::RemoteNotFound(_))
    }

    /// Shorthand for constructing a [`TransferError::Connection`]
    pub(crate) fn connection<S: Into<String>>(what: S, source: std::io::Error) -> Self {
        Self::Connection {
            what: what.into(),
            source,
        }
    }
}
