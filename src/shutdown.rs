// SPDX-License-Identifier: MIT
//! Termination signal handling.
//!
//! `SIGTERM` or `SIGINT` (`Ctrl-C`) cancels a shared [`CancellationToken`]. Everything that
//! must stop on shutdown (the HTTP server, then the telemetry flush) waits on that token
//! instead of registering its own handler.
//!
//! Handlers are registered when [`Signals::install`] runs, not when the returned future is
//! first polled, so a signal delivered right after startup is never handled by the
//! default disposition.
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Which signal triggered shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Interrupt,
}

/// Registered termination signal handlers.
pub struct Signals {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
}

impl Signals {
    /// Register the handlers. Must be called from within a Tokio runtime.
    ///
    /// A handler that cannot be installed is logged and treated as never firing, so the
    /// other one still works.
    #[cfg(unix)]
    pub fn install() -> Self {
        Self {
            terminate: register(SignalKind::terminate(), "SIGTERM"),
            interrupt: register(SignalKind::interrupt(), "SIGINT"),
        }
    }

    #[cfg(not(unix))]
    pub fn install() -> Self {
        Self {}
    }

    /// Wait for the first termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = recv_or_pending(&mut self.terminate) => Signal::Terminate,
            _ = recv_or_pending(&mut self.interrupt) => Signal::Interrupt,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Signal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        Signal::Interrupt
    }
}

#[cfg(unix)]
fn register(kind: SignalKind, name: &str) -> Option<tokio::signal::unix::Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::error!(error = %e, signal = name, "Failed to install signal handler");
            None
        }
    }
}

#[cfg(unix)]
async fn recv_or_pending(stream: &mut Option<tokio::signal::unix::Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Install signal handlers and cancel `token` on the first termination signal.
///
/// The task also ends quietly if the token is cancelled by someone else first.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    let mut signals = Signals::install();
    tokio::spawn(async move {
        tokio::select! {
            signal = signals.recv() => {
                tracing::info!(?signal, "Shutdown signal received");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
