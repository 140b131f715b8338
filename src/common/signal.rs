use tracing::{info, warn};

/// 等待 Ctrl-C 或 SIGTERM
///
/// 信号处理器装不上时只告警，该路信号视为永不到达。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "[Signal] Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "[Signal] Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("[Signal] Received SIGINT, starting graceful shutdown"),
        () = terminate => info!("[Signal] Received SIGTERM, starting graceful shutdown"),
    }
}
