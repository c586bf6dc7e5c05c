use crate::config::ConversionRequest;
use crate::engines::ConvertEngine;
use crate::error::{AppError, Result};
use crate::output::ensure_output_dir;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time a cancelled worker gets to release the browser before it is aborted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run one conversion end to end: pre-flight checks, then the engine under
/// the request's deadline.
pub async fn run(request: ConversionRequest, engine: Arc<dyn ConvertEngine>) -> Result<()> {
    preflight(&request)?;

    info!(
        "Converting {} to {}",
        request.input.display(),
        request.output.display()
    );

    let cancel = CancellationToken::new();
    let deadline = request.timeout;
    let worker_cancel = cancel.clone();
    supervise(deadline, cancel, async move {
        engine.convert(&request, worker_cancel).await
    })
    .await
}

/// Checks that need no browser.
pub fn preflight(request: &ConversionRequest) -> Result<()> {
    if !request.input.exists() {
        return Err(AppError::InputNotFound(request.input.clone()));
    }
    ensure_output_dir(&request.output)
}

/// Race `worker` against `deadline`.
///
/// On expiry the token is cancelled and the worker gets [`SHUTDOWN_GRACE`] to
/// clean up before being aborted; the result is always
/// [`AppError::Timeout`], whatever the worker reports afterwards.
pub async fn supervise<F>(deadline: Duration, cancel: CancellationToken, worker: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let mut handle = tokio::spawn(worker);

    match tokio::time::timeout(deadline, &mut handle).await {
        Ok(joined) => {
            joined.map_err(|e| AppError::Internal(format!("conversion task failed: {}", e)))?
        }
        Err(_) => {
            cancel.cancel();
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(_) => info!("Conversion cancelled after timeout"),
                Err(_) => {
                    warn!("Conversion did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                    handle.abort();
                }
            }
            Err(AppError::Timeout(deadline))
        }
    }
}
