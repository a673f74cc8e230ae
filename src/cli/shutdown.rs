use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Cancels `cancelation` on Ctrl-C. Returns early once someone else cancels it, so it can be
/// joined with the work it guards.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C {e:?}");
                return;
            }
            debug!("Received Ctrl-C");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}
