use std::future::Future;
use std::time::Duration;

/// Bounds a Redis command with a deadline so a slow store can never hold a
/// request open past the configured budget. A deadline hit surfaces as a
/// regular `RedisError` and flows through the usual error mapping.
pub async fn run_with_timeout<T, F>(timeout: Duration, fut: F) -> redis::RedisResult<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "redis command timed out",
        ))),
    }
}
