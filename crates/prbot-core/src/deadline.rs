//! Overall deadline for one bot invocation.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::{BotError, Result};

/// Run `fut` to completion or fail with [`BotError::Timeout`] after `after`.
///
/// On expiry the future is dropped, which cancels the in-flight host call.
/// Work already completed (deleted runs, dismissed reviews) stays done.
pub async fn with_deadline<T, F>(operation: &str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, ?after, "deadline exceeded");
            Err(BotError::Timeout {
                operation: operation.to_string(),
                after,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out() {
        let err = with_deadline("check", Duration::from_secs(60), async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, BotError::Timeout { ref operation, .. } if operation == "check"));
    }

    #[tokio::test]
    async fn fast_future_passes_through() {
        let v = with_deadline("check", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);
    }
}
