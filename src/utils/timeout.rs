use anyhow::{Result, anyhow};
use std::future::Future;
use std::time::Duration;

/// Runs a fallible network call under a deadline.
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(anyhow!("{} timed out after {:?}", what, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_times_out() {
        let res: Result<()> = with_timeout(Duration::from_millis(10), "slow call", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = res.unwrap_err().to_string();
        assert!(err.contains("slow call timed out"), "{}", err);
    }

    #[tokio::test]
    async fn test_passes_result_through() {
        let res = with_timeout(Duration::from_secs(1), "fast call", async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
