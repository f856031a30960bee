//! # Cross-platform OS signal handling.
//!
//! Provides [`wait_for_shutdown_signal`], used by [`Reactor::run`](crate::Reactor::run)
//! to turn a termination signal into a graceful manager shutdown.
//!
//! ## Signals
//! **Unix platforms:** `SIGINT` (Ctrl-C), `SIGTERM` (service managers), `SIGQUIT`.
//!
//! **Windows platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => tracing::debug!("SIGINT"),
        _ = sigterm.recv() => tracing::debug!("SIGTERM"),
        _ = sigquit.recv() => tracing::debug!("SIGQUIT"),
    }
    Ok(())
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
