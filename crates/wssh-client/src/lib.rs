//! wssh-client: interactive remote-terminal client over WebSocket.
//!
//! Architecture:
//! - `terminal`: raw-mode guard, size queries, async stdin/stdout
//! - `connection`: persistent duplex WebSocket channel with liveness pings
//! - `input` / `output` / `resize`: the three concurrent session tasks
//! - `session`: controller that wires them together and guarantees the
//!   terminal is restored on every exit path

pub mod cli;
pub mod connection;
pub mod input;
pub mod output;
pub mod resize;
pub mod session;
pub mod terminal;

pub use cli::{normalize_url, Cli};
pub use connection::{Connection, MessageSender};
pub use session::{Session, SessionEvent, SessionState};
pub use terminal::{restore_terminal, terminal_size, RawModeGuard, StdinReader, StdoutWriter};
