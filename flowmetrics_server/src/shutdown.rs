use tokio::sync::watch;

/// Resolve on SIGINT or (on unix) SIGTERM. Returns the signal name.
pub async fn signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                Ok("SIGINT")
            }
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT")
    }
}

/// Spawn a task that flips the returned receiver to `true` on the first signal.
pub fn spawn_signal_watcher() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal().await {
            Ok(name) => tracing::info!(signal = name, "shutting down after in-flight trigger"),
            Err(e) => tracing::error!(error = %e, "signal handler failed; shutting down"),
        }
        let _ = tx.send(true);
    });
    rx
}
