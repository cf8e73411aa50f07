//! Error types for wssh-core.

use thiserror::Error;

/// Main error type for wssh operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel could not be opened. Fatal for the attempt; the caller
    /// decides whether to retry.
    #[error("connect failed: {message}")]
    Connect { message: String },

    /// Connection was closed by the peer or the transport (including
    /// liveness-probe expiry).
    #[error("connection closed")]
    ConnectionClosed,

    /// Outbound message could not be encoded. The receive path never
    /// produces this - inbound non-JSON payloads are reclassified as raw
    /// stdout data instead.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Raw-mode entry or restore failed (e.g. non-interactive terminal).
    #[error("terminal mode error: {message}")]
    TerminalMode { message: String },

    /// Internal channel error between session tasks.
    #[error("channel error: {message}")]
    Channel { message: String },
}

impl Error {
    /// Returns true if this error marks a normal end of session rather
    /// than a fault.
    ///
    /// A remote close (or liveness expiry, which is treated identically)
    /// terminates the session but is reported to the user as information,
    /// not as a failure.
    pub fn is_clean_shutdown(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}

/// Convenience result type for wssh operations.
pub type Result<T> = std::result::Result<T, Error>;
