//! Remote output dispatch.
//!
//! Classification is a pure function so the raw-vs-structured rules are
//! testable without a socket; [`run_output_dispatch`] drives it from the
//! connection's inbound sequence.

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use wssh_core::protocol::{Inbound, Operation};

use crate::connection::Connection;
use crate::session::SessionEvent;
use crate::terminal::StdoutWriter;

/// What to do with one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Write these bytes to the local terminal.
    Write(Vec<u8>),
    /// Nothing to display.
    Ignore,
}

/// Decide how an inbound payload is rendered.
///
/// Structured `stdout` messages and raw non-JSON payloads both end up on
/// the local terminal; everything else is dropped. A `stdout` message
/// whose data field is absent displays nothing.
pub fn classify(inbound: Inbound) -> Dispatch {
    match inbound {
        Inbound::Raw(text) => Dispatch::Write(text.into_bytes()),
        Inbound::Message(msg) => match msg.operation {
            Operation::Stdout => match msg.data {
                Some(data) => Dispatch::Write(data.into_bytes()),
                None => Dispatch::Ignore,
            },
            // Client-bound traffic only carries stdout; anything else is
            // logged and dropped rather than rendered
            op => {
                warn!(?op, "ignoring non-stdout message");
                Dispatch::Ignore
            }
        },
    }
}

/// Run the output dispatch loop.
///
/// Owns the connection for the lifetime of the task and hands it back on
/// exit so the controller can close it. Reports a `RemoteClosed` event
/// when the inbound sequence ends.
pub async fn run_output_dispatch(
    mut conn: Connection,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> Connection {
    let mut stdout = StdoutWriter::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            inbound = conn.recv() => match inbound {
                Some(inbound) => match classify(inbound) {
                    Dispatch::Write(bytes) => {
                        let _ = stdout.write(&bytes).await;
                    }
                    Dispatch::Ignore => {}
                },
                None => {
                    debug!("remote closed the connection");
                    let _ = events.send(SessionEvent::RemoteClosed);
                    break;
                }
            },
        }
    }

    conn
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wssh_core::protocol::{decode, ProtocolMessage};

    #[test]
    fn stdout_message_writes_its_data() {
        let inbound = Inbound::Message(ProtocolMessage::stdout("hello\r\n".to_string()));
        assert_eq!(classify(inbound), Dispatch::Write(b"hello\r\n".to_vec()));
    }

    #[test]
    fn raw_payload_writes_verbatim() {
        assert_eq!(
            classify(Inbound::Raw("hello".to_string())),
            Dispatch::Write(b"hello".to_vec())
        );
    }

    #[test]
    fn raw_and_structured_stdout_render_identically() {
        let raw = classify(decode("hello"));
        let structured = classify(decode(r#"{"operation":"stdout","data":"hello"}"#));
        assert_eq!(raw, structured);
    }

    #[test]
    fn stdout_without_data_displays_nothing() {
        let inbound = decode(r#"{"operation":"stdout"}"#);
        assert_eq!(classify(inbound), Dispatch::Ignore);
    }

    #[test]
    fn non_stdout_operations_are_dropped() {
        for payload in [
            r#"{"operation":"stdin","data":"x"}"#,
            r#"{"operation":"resize","data":null,"cols":80,"rows":24}"#,
            r#"{"operation":"somethingelse","data":"x"}"#,
        ] {
            assert_eq!(classify(decode(payload)), Dispatch::Ignore);
        }
    }

    #[test]
    fn malformed_json_falls_back_to_raw_write() {
        assert_eq!(
            classify(decode("{not json")),
            Dispatch::Write(b"{not json".to_vec())
        );
    }
}
