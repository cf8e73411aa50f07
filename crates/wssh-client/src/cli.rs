//! Client CLI implementation.
//!
//! Provides command-line argument parsing using clap.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use wssh_core::error::{Error, Result};
use wssh_core::LogFormat;

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => LogFormat::Text,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

/// Interactive remote-terminal client over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "wssh", version, about)]
pub struct Cli {
    /// WebSocket endpoint (ws://host:port/path or wss://...)
    pub url: String,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to a file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text", value_enum)]
    pub log_format: CliLogFormat,
}

/// Normalize a user-supplied endpoint URL.
///
/// Shells and copy-paste often leave quotes around the URL; strip one
/// matching pair before validating the scheme.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let unquoted = strip_quotes(trimmed);

    if unquoted.is_empty() {
        return Err(Error::Connect {
            message: "empty URL".to_string(),
        });
    }
    if !unquoted.starts_with("ws://") && !unquoted.starts_with("wss://") {
        return Err(Error::Connect {
            message: format!("URL must start with ws:// or wss://, got '{}'", unquoted),
        });
    }

    Ok(unquoted.to_string())
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

// =============================================================================
// Tests
// =============================================================================
