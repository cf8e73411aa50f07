//! Local keystroke capture.
//!
//! A pure [`LineEditor`] state machine carries the byte-level rules so they
//! can be tested without a terminal; [`run_input_capture`] wires it to
//! stdin and the connection.

use std::borrow::Cow;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use wssh_core::constants::EXIT_COMMAND;
use wssh_core::protocol::ProtocolMessage;

use crate::connection::MessageSender;
use crate::session::SessionEvent;
use crate::terminal::{StdinReader, StdoutWriter};

/// Ctrl+C.
const ETX: u8 = 0x03;
/// Ctrl+D.
const EOT: u8 = 0x04;

/// How keystrokes are turned into protocol messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Assemble printable bytes into lines; submit on CR/LF.
    #[default]
    LineBuffered,
    /// Forward raw bytes as `stdin` data. Used once the handshake
    /// completes: the remote shell owns line editing, so the local
    /// buffer stays empty.
    ByteForward,
}

/// Outcome of feeding one byte to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Nothing to do (byte buffered, dropped, or duplicate terminator).
    None,
    /// Echo this byte locally (line mode buffers without terminal echo).
    Echo(u8),
    /// A completed command line, newline included.
    Submit(String),
    /// Forward this byte as-is. Forwarded bytes from one read are sent
    /// together so a multibyte keystroke is never split across messages.
    Forward(u8),
    /// User asked to end the session (Ctrl+C, Ctrl+D on an empty buffer,
    /// or the `exit` command).
    Terminate,
}

/// Line-oriented input buffer.
///
/// Owns the printable bytes received since the last line terminator;
/// cleared after each submitted command.
#[derive(Debug, Default)]
pub struct LineEditor {
    mode: InputMode,
    buffer: Vec<u8>,
    last_was_newline: bool,
}

impl LineEditor {
    pub fn new(mode: InputMode) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
            last_was_newline: false,
        }
    }

    /// Current buffer contents (for inspection in tests and prompts).
    pub fn buffer(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Feed one received byte and decide what to do with it.
    pub fn feed(&mut self, byte: u8) -> InputEvent {
        match self.mode {
            InputMode::ByteForward => match byte {
                // The forward-mode buffer is always empty, so EOT
                // terminates unconditionally.
                ETX | EOT => InputEvent::Terminate,
                b => InputEvent::Forward(b),
            },
            InputMode::LineBuffered => self.feed_line(byte),
        }
    }

    fn feed_line(&mut self, byte: u8) -> InputEvent {
        let was_newline = std::mem::replace(&mut self.last_was_newline, false);
        match byte {
            // Terminate immediately, regardless of buffered content
            ETX => InputEvent::Terminate,
            // Terminate only on an empty line; inside a partial command
            // EOT is deliberately ignored
            EOT => {
                if self.buffer.is_empty() {
                    InputEvent::Terminate
                } else {
                    InputEvent::None
                }
            }
            b'\r' | b'\n' => {
                self.last_was_newline = true;
                if was_newline {
                    // Second half of a CRLF pair from a single keypress
                    return InputEvent::None;
                }
                let event = {
                    let line = String::from_utf8_lossy(&self.buffer);
                    let cmd = line.trim();
                    if cmd == EXIT_COMMAND {
                        InputEvent::Terminate
                    } else if cmd.is_empty() {
                        InputEvent::None
                    } else {
                        InputEvent::Submit(format!("{}\n", cmd))
                    }
                };
                self.buffer.clear();
                event
            }
            // Raw bytes, not chars: UTF-8 continuation bytes land here too
            // and stay intact until the line is decoded as a whole
            b if b >= 0x20 => {
                self.buffer.push(b);
                InputEvent::Echo(b)
            }
            // Other control bytes are dropped, never buffered
            _ => InputEvent::None,
        }
    }
}

/// Run the input capture loop.
///
/// Reads raw bytes from stdin, feeds them through the editor, and emits
/// `stdin` messages on the connection. Shutdown is observed between
/// chunks via the watch channel.
pub async fn run_input_capture(
    mut stdin: StdinReader,
    sender: MessageSender,
    mode: InputMode,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut editor = LineEditor::new(mode);
    let mut echo = StdoutWriter::new();

    loop {
        let chunk = tokio::select! {
            _ = shutdown.changed() => break,
            chunk = stdin.read() => match chunk {
                Some(chunk) => chunk,
                None => {
                    // stdin EOF behaves like Ctrl+D on an empty line
                    debug!("EOF on stdin");
                    let _ = events.send(SessionEvent::UserInterrupt);
                    break;
                }
            },
        };

        // Forwarded bytes from this chunk, sent as one message so a
        // multibyte keystroke is never split.
        let mut pending: Vec<u8> = Vec::new();

        for &byte in &chunk {
            match editor.feed(byte) {
                InputEvent::None => {}
                InputEvent::Echo(b) => {
                    let _ = echo.write(&[b]).await;
                }
                InputEvent::Submit(line) => {
                    // Move to the next line locally before remote output lands
                    let _ = echo.write(b"\r\n").await;
                    if sender.send(ProtocolMessage::stdin(line)).is_err() {
                        let _ = events.send(SessionEvent::RemoteClosed);
                        return;
                    }
                }
                InputEvent::Forward(b) => pending.push(b),
                InputEvent::Terminate => {
                    // Bytes typed before the terminator still go out
                    if !pending.is_empty() {
                        let _ = sender.send(ProtocolMessage::stdin(forwarded_data(&pending)));
                    }
                    debug!("user requested termination");
                    let _ = events.send(SessionEvent::UserInterrupt);
                    return;
                }
            }
        }

        if !pending.is_empty()
            && sender
                .send(ProtocolMessage::stdin(forwarded_data(&pending)))
                .is_err()
        {
            let _ = events.send(SessionEvent::RemoteClosed);
            return;
        }
    }
}

/// Message payload for a run of forwarded bytes.
fn forwarded_data(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// =============================================================================
// Tests
// =============================================================================
