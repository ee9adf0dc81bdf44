use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

/// Cooperative stop request, honoured between ticks.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Trigger this signal on SIGINT or SIGTERM. The wait runs on a dedicated
    /// thread with its own single-threaded tokio runtime.
    pub fn listen_for_os_signals(&self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build signal runtime")?;
        let shutdown = self.clone();
        thread::Builder::new()
            .name("shutdown-signal".to_string())
            .spawn(move || {
                runtime.block_on(wait_for_signal());
                info!("shutdown requested, finishing the current tick");
                shutdown.trigger();
            })
            .context("failed to spawn signal thread")?;
        Ok(())
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
