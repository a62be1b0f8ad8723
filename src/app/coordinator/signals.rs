//! Signal handling for graceful cancellation
//!
//! Ctrl-C and SIGTERM cancel the batch token. Fetches in flight abandon
//! their attempt, remove their temp file, and chapters that have not started
//! report `Cancelled`, so the batch still returns one result per chapter.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels a token when the process is asked to stop
pub struct SignalHandler {
    cancel: CancellationToken,
}

impl SignalHandler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Spawn the task watching for Ctrl-C and SIGTERM
    ///
    /// The task ends once a signal arrives or the token is cancelled by
    /// someone else.
    pub fn setup(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Could not install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        warn!("Could not install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl+C, cancelling downloads");
                },
                _ = terminate => {
                    info!("Received terminate signal, cancelling downloads");
                },
                _ = cancel.cancelled() => {
                    return;
                },
            }

            cancel.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Test the watcher task exits when the token is cancelled elsewhere
    #[tokio::test]
    async fn test_handler_stops_with_token() {
        let cancel = CancellationToken::new();
        let handle = SignalHandler::new(cancel.clone()).setup();

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let joined = timeout(Duration::from_millis(500), handle).await;
        assert!(joined.is_ok());
    }
}
