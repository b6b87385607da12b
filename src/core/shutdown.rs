use tokio::signal;
use tokio::sync::watch;

/// Resolves once the process receives Ctrl+C or SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let source = tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "sigterm",
    };

    tracing::info!(source = source, "Shutdown signal received");
}

/// Receiver that flips to `true` once a shutdown signal arrives.
/// Background loops select on `changed()` to stop between ticks.
pub(crate) fn shutdown_watch() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        if tx.send(true).is_err() {
            tracing::debug!("No background tasks left to notify of shutdown");
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::shutdown_watch;

    #[tokio::test]
    async fn watch_starts_running() {
        let rx = shutdown_watch();
        assert!(!*rx.borrow());
    }
}
