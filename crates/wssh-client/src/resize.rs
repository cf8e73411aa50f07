//! Terminal size monitoring.
//!
//! Polls the terminal dimensions once a second and sends a `resize`
//! message whenever they change. The probe is injected so the loop can be
//! tested against a scripted size source.

use tokio::sync::watch;
use tracing::debug;

use wssh_core::constants::RESIZE_POLL_INTERVAL;
use wssh_core::protocol::{ProtocolMessage, TermSize};

use crate::connection::MessageSender;

/// Run the resize monitor loop.
///
/// `initial` is the size already reported during the handshake; only
/// subsequent changes produce messages. Exits when shutdown is signalled
/// or the connection goes away.
pub async fn run_resize_monitor<F>(
    sender: MessageSender,
    initial: TermSize,
    mut shutdown: watch::Receiver<bool>,
    probe: F,
) where
    F: Fn() -> TermSize,
{
    let mut last = initial;
    let mut ticker = tokio::time::interval(RESIZE_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately; consume it so
    // the first probe happens one poll interval after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let current = probe();
                if current != last {
                    debug!(cols = current.cols, rows = current.rows, "terminal resized");
                    if sender.send(ProtocolMessage::resize(current)).is_err() {
                        break;
                    }
                    last = current;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wssh_core::protocol::Operation;

    fn test_sender() -> (MessageSender, mpsc::UnboundedReceiver<ProtocolMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MessageSender::from_channel(tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_size_sends_nothing() {
        let (sender, mut rx) = test_sender();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let initial = TermSize { cols: 80, rows: 24 };

        let monitor = tokio::spawn(run_resize_monitor(sender, initial, shutdown_rx, move || {
            initial
        }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = shutdown_tx.send(true);
        monitor.await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn size_change_sends_exactly_one_resize() {
        let (sender, mut rx) = test_sender();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let initial = TermSize { cols: 80, rows: 24 };

        let cols = Arc::new(AtomicU16::new(80));
        let probe_cols = cols.clone();
        let monitor = tokio::spawn(run_resize_monitor(sender, initial, shutdown_rx, move || {
            TermSize {
                cols: probe_cols.load(Ordering::SeqCst),
                rows: if probe_cols.load(Ordering::SeqCst) == 80 { 24 } else { 30 },
            }
        }));

        // Let a couple of polls pass at the original size
        tokio::time::sleep(Duration::from_secs(2)).await;
        cols.store(100, Ordering::SeqCst);
        // Several more polls at the new size: one message, not one per poll
        tokio::time::sleep(Duration::from_secs(4)).await;

        let _ = shutdown_tx.send(true);
        monitor.await.unwrap();

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.operation, Operation::Resize);
        assert_eq!(msg.cols, Some(100));
        assert_eq!(msg.rows, Some(30));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_monitor() {
        let (sender, _rx) = test_sender();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let initial = TermSize::default();

        let monitor = tokio::spawn(run_resize_monitor(sender, initial, shutdown_rx, move || {
            initial
        }));

        let _ = shutdown_tx.send(true);
        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .unwrap()
            .unwrap();
    }
}
