use std::future::Future;
use std::time::Duration;

use bridge_common::error::{BridgeError, BridgeResult};

/// Which side of the bridge a call goes to. Picks the error reported on
/// timeout.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Side {
    Upstream,
    Downstream,
}

pub(crate) async fn bounded<T, F>(
    limit: Duration,
    side: Side,
    operation: &str,
    call: F,
) -> BridgeResult<T>
where
    F: Future<Output = BridgeResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            let msg = format!("{operation} timed out after {}s", limit.as_secs());
            Err(match side {
                Side::Upstream => BridgeError::UpstreamUnavailable(msg),
                Side::Downstream => BridgeError::DownstreamUnavailable(msg),
            })
        }
    }
}
