//! Core engine. Runs the sample → score → decide → execute cycle.

pub mod accountant;
pub mod coordinator;
pub mod executor;

use std::future::Future;
use std::time::Duration;

use crate::types::{CoreError, CoreResult};

/// Bound a collaborator call. Running out of time is a `BridgeTimeout`,
/// never a success.
pub async fn with_timeout<T, F>(operation: &str, timeout_ms: u64, call: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::BridgeTimeout {
            operation: operation.to_string(),
            timeout_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout("fast", 1_000, async { Ok::<_, CoreError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_timeout("fast", 1_000, async {
            Err::<u32, _>(CoreError::BridgeUnavailable("down".into()))
        })
        .await;
        assert!(matches!(err, Err(CoreError::BridgeUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, CoreError>(())
        };
        let err = with_timeout("slow", 50, slow).await.unwrap_err();
        assert_eq!(
            err,
            CoreError::BridgeTimeout {
                operation: "slow".into(),
                timeout_ms: 50
            }
        );
    }
}
