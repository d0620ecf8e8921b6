//! Network call deadlines.

use crate::ClientError;
use core::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// Runs a client call under `timeout`, aborting early if `kill` is cancelled.
pub(crate) async fn with_timeout<T, F>(
    kill: &CancellationToken,
    timeout: Duration,
    fut: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = kill.cancelled() => Err(ClientError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(timeout)),
        },
    }
}
