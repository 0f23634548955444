//! One transparent retry for operations that lost a race on a plan's rows.

use std::time::Duration;

use crate::error::ApiError;

/// Pause before the second attempt.
pub const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Run `operation`, retrying once if it failed with [`ApiError::ConcurrentModification`].
///
/// # Arguments
/// * `name` - Operation name used in the log line
/// * `operation` - Closure producing a fresh attempt; each attempt must open its own transaction
///
/// # Returns
/// The result of the first attempt, or of the second if the first hit contention.
pub async fn retry_once<T, F, Fut>(name: &'static str, mut operation: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    match operation().await {
        Err(ApiError::ConcurrentModification) => {
            tracing::warn!(operation = name, "concurrent modification, retrying once");
            tokio::time::sleep(RETRY_DELAY).await;
            operation().await
        }
        result => result,
    }
}
