use anyhow::Context;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;

/// Spawns a thread that raises `flag` on SIGINT or SIGTERM.
pub fn install(flag: Arc<AtomicBool>) -> anyhow::Result<JoinHandle<()>> {
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;

    thread::Builder::new()
        .name("shutdown-signal".into())
        .spawn(move || {
            runtime.block_on(wait_for_signal());
            flag.store(true, Ordering::SeqCst);
        })
        .context("spawning signal thread")
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("[shutdown] Ctrl+C handler unavailable: {}", err);
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
                warn!("[shutdown] SIGTERM handler unavailable: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("[shutdown] received Ctrl+C, finishing current cycle"),
        _ = terminate => info!("[shutdown] received SIGTERM, finishing current cycle"),
    }
}
