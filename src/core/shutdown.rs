use tokio::signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownReason {
    Interrupt,
    Terminate,
}

impl ShutdownReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }
}

async fn interrupt() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

pub(crate) async fn wait_for_signal() -> ShutdownReason {
    tokio::select! {
        _ = interrupt() => ShutdownReason::Interrupt,
        _ = terminate() => ShutdownReason::Terminate,
    }
}

/// Resolves once the process is asked to stop; in-flight store writes finish before exit.
pub(crate) async fn shutdown_signal() {
    let reason = wait_for_signal().await;
    tracing::info!(signal = reason.as_str(), "Shutdown requested; draining requests");
}
