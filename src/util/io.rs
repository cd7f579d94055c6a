//! I/O helpers
use std::future::Future;
use std::time::Duration;

use crate::error::TransferError;

/// Converts a configured timeout in seconds into the form used by the I/O layer.
/// Zero means "no timeout".
#[must_use]
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Runs a network operation, subject to an optional timeout.
///
/// `what` describes the operation for the error message, e.g. "waiting for the server to connect".
pub(crate) async fn with_timeout<F, T>(
    limit: Option<Duration>,
    what: &'static str,
    fut: F,
) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    match limit {
        None => fut.await,
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| TransferError::Timeout(what))?,
    }
}
