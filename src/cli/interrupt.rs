//! Interrupt handling for a running prompt
//!
//! First signal: cancel the run at the next iteration boundary.
//! Second signal: give up waiting and let the caller exit immediately.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How the interrupt watcher finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// A second signal arrived while the run was winding down
    ForceQuit,

    /// The signal source failed or closed; nothing more will arrive
    Closed,
}

/// Watch a signal source for the lifetime of a run
///
/// `next_signal` resolves once per signal. The first one cancels `cancel`;
/// the watcher then returns [`Interrupt::ForceQuit`] on the second.
pub async fn watch_interrupts<F, Fut>(cancel: CancellationToken, mut next_signal: F) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_signal().await {
        warn!(error = %e, "interrupt handler unavailable");
        return Interrupt::Closed;
    }

    info!("interrupt received, cancelling after the current round");
    cancel.cancel();

    match next_signal().await {
        Ok(()) => {
            warn!("second interrupt received, quitting");
            Interrupt::ForceQuit
        }
        Err(_) => Interrupt::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex};

    /// Signal source fed by a channel; a dropped sender reads as closed
    fn channel_source(
        rx: mpsc::UnboundedReceiver<()>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>> {
        let rx = Arc::new(Mutex::new(rx));
        move || {
            let rx = rx.clone();
            Box::pin(async move {
                rx.lock()
                    .await
                    .recv()
                    .await
                    .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            })
        }
    }

    #[tokio::test]
    async fn test_first_signal_cancels_second_forces_quit() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch_interrupts(cancel.clone(), channel_source(rx)));

        tx.send(()).unwrap();
        cancel.cancelled().await;
        assert!(!watcher.is_finished());

        tx.send(()).unwrap();
        assert_eq!(watcher.await.unwrap(), Interrupt::ForceQuit);
    }

    #[tokio::test]
    async fn test_closed_source_leaves_run_alone() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        drop(tx);
        let cancel = CancellationToken::new();

        let outcome = watch_interrupts(cancel.clone(), channel_source(rx)).await;
        assert_eq!(outcome, Interrupt::Closed);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_single_signal_then_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tx.send(()).unwrap();
        drop(tx);
        let outcome = watch_interrupts(cancel.clone(), channel_source(rx)).await;

        assert!(cancel.is_cancelled());
        assert_eq!(outcome, Interrupt::Closed);
    }
}
