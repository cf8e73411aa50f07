//! Protocol and timing constants for wssh.

use std::time::Duration;

// =============================================================================
// Timing Constants
// =============================================================================

/// Interval between WebSocket liveness pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long a liveness probe may stay unanswered before the channel is
/// treated as closed.
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed sleep between terminal size checks.
pub const RESIZE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the session waits for the connection pump to drain during
/// close before giving up.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Default Values
// =============================================================================

/// Default terminal columns when the size cannot be queried.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal rows when the size cannot be queried.
pub const DEFAULT_ROWS: u16 = 24;

/// Literal command that ends the session when submitted as a line.
pub const EXIT_COMMAND: &str = "exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_timeout_shorter_than_interval() {
        // A probe must resolve before the next one is due.
        assert!(PING_TIMEOUT < PING_INTERVAL);
    }

    #[test]
    fn resize_poll_is_bounded() {
        assert!(RESIZE_POLL_INTERVAL <= Duration::from_secs(1));
    }

    #[test]
    fn default_size_is_nonzero() {
        assert!(DEFAULT_COLS > 0);
        assert!(DEFAULT_ROWS > 0);
    }
}
