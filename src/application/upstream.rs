use crate::error::{ChallengeError, Result, UpstreamError, UpstreamService};
use std::future::Future;
use std::time::Duration;

/// Runs one upstream call with a bounded timeout and translates its failure
/// into [`ChallengeError::UpstreamUnavailable`].
///
/// Dropping the returned future drops the in-flight call.
pub(crate) async fn guarded<T, F>(service: UpstreamService, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, UpstreamError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::warn!(%service, error = %err, "Upstream call failed");
            Err(ChallengeError::upstream(service, err))
        }
        Err(_) => {
            tracing::warn!(%service, timeout_ms = limit.as_millis() as u64, "Upstream call timed out");
            Err(ChallengeError::upstream(
                service,
                format!("no response within {}ms", limit.as_millis()),
            ))
        }
    }
}
