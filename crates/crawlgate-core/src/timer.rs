use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Race `operation` against `deadline`.
///
/// When the deadline wins the operation future is dropped and its result,
/// if it ever had one, is lost. Backends get no other cancellation signal.
pub async fn run_with_deadline<F>(deadline: Duration, operation: F) -> Result<F::Output, AppError>
where
    F: Future,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| AppError::ExecutionTimeout(deadline))
}
