//! Session controller.
//!
//! Drives the connection lifecycle through its states and owns the one
//! invariant everything else depends on: the terminal is restored on every
//! exit path, normal or not.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use wssh_core::error::{Error, Result};
use wssh_core::protocol::{ProtocolMessage, TermSize};

use crate::connection::{Connection, MessageSender};
use crate::input::{self, InputMode};
use crate::output;
use crate::resize;
use crate::terminal::{self, RawModeGuard, StdinReader};

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Handshaking,
    Active,
    Closing,
}

/// Why the active phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user asked to leave (Ctrl+C, Ctrl+D, `exit`, or stdin EOF).
    UserInterrupt,
    /// The remote end closed the connection or it failed.
    RemoteClosed,
}

/// An interactive remote-terminal session.
pub struct Session {
    url: String,
    state: SessionState,
}

impl Session {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// Connects, performs the handshake, relays traffic until either side
    /// ends the session, and tears everything down. A remote-initiated
    /// close surfaces as [`Error::ConnectionClosed`] so the caller can
    /// distinguish it from a local quit.
    pub async fn run(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;
        info!(url = %self.url, "connecting");
        let conn = match Connection::connect(&self.url).await {
            Ok(conn) => conn,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e);
            }
        };

        println!("Connected to {}", self.url);
        println!("Type 'exit' or press Ctrl+C to disconnect.\n");

        self.state = SessionState::Handshaking;
        let sender = conn.sender();
        let size = terminal::terminal_size();
        if let Err(e) = handshake(&sender, size) {
            conn.close().await;
            self.state = SessionState::Disconnected;
            return Err(e);
        }

        // Raw mode only after the handshake is queued. On a
        // non-interactive terminal raw mode is unavailable; the session
        // still runs with the terminal left as it is.
        let raw_guard = match RawModeGuard::enter() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(error = %e, "could not enter raw mode, continuing without it");
                None
            }
        };

        self.state = SessionState::Active;
        let result = self.run_active(conn, sender, size).await;

        // Restore before any further printing, whatever happened above.
        drop(raw_guard);
        terminal::restore_terminal();
        self.state = SessionState::Disconnected;

        match result {
            Ok(SessionEvent::UserInterrupt) => {
                println!("\nDisconnected.");
                Ok(())
            }
            Ok(SessionEvent::RemoteClosed) => Err(Error::ConnectionClosed),
            Err(e) => Err(e),
        }
    }

    /// Relay traffic until one of the session tasks reports an end event.
    async fn run_active(
        &mut self,
        conn: Connection,
        sender: MessageSender,
        size: TermSize,
    ) -> Result<SessionEvent> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let input_task = tokio::spawn(input::run_input_capture(
            StdinReader::new(),
            sender.clone(),
            InputMode::ByteForward,
            shutdown_rx.clone(),
            event_tx.clone(),
        ));
        let output_task = tokio::spawn(output::run_output_dispatch(
            conn,
            shutdown_rx.clone(),
            event_tx,
        ));
        let resize_task = tokio::spawn(resize::run_resize_monitor(
            sender,
            size,
            shutdown_rx,
            terminal::terminal_size,
        ));

        // First event wins; whichever task reports it, everyone shuts down.
        let event = event_rx.recv().await.unwrap_or(SessionEvent::RemoteClosed);
        debug!(?event, "session ending");
        self.state = SessionState::Closing;
        let _ = shutdown_tx.send(true);

        let _ = input_task.await;
        let _ = resize_task.await;
        match output_task.await {
            Ok(conn) => conn.close().await,
            Err(e) => {
                return Err(Error::Channel {
                    message: format!("output task failed: {}", e),
                })
            }
        }

        Ok(event)
    }
}

/// Send the session-opening messages.
///
/// A carriage return wakes the remote shell into printing its prompt, and
/// the initial resize tells it the local dimensions before any output is
/// rendered.
pub fn handshake(sender: &MessageSender, size: TermSize) -> Result<()> {
    sender.send(ProtocolMessage::stdin("\r"))?;
    sender.send(ProtocolMessage::resize(size))?;
    debug!(cols = size.cols, rows = size.rows, "handshake sent");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use wssh_core::protocol::Operation;

    #[test]
    fn new_session_is_disconnected() {
        let session = Session::new("ws://localhost:9000/term");
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn handshake_sends_wakeup_then_resize() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = MessageSender::from_channel(tx);

        handshake(&sender, TermSize { cols: 120, rows: 40 }).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.operation, Operation::Stdin);
        assert_eq!(first.data.as_deref(), Some("\r"));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.operation, Operation::Resize);
        assert_eq!(second.cols, Some(120));
        assert_eq!(second.rows, Some(40));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn handshake_fails_once_channel_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = MessageSender::from_channel(tx);
        drop(rx);

        let err = handshake(&sender, TermSize::default()).unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn connect_failure_leaves_session_disconnected() {
        // Port 1 is essentially never listening.
        let mut session = Session::new("ws://127.0.0.1:1/term");
        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
