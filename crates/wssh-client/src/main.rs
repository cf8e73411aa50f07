//! wssh client binary entry point.
//!
//! Interactive remote-terminal client over WebSocket.

use clap::Parser;
use tracing::{error, info};

use wssh_client::{normalize_url, restore_terminal, Cli, Session};

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_format = cli.log_format.into();
    if let Err(e) = wssh_core::init_logging(cli.verbose, cli.log_file.as_deref(), log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "wssh client starting");

    let url = match normalize_url(&cli.url) {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "Invalid URL");
            eprintln!("wssh: {}", e);
            eprintln!("Usage: wssh ws://host:port/path");
            std::process::exit(2);
        }
    };

    // Create tokio runtime
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = rt.block_on(async {
        let mut session = Session::new(url);
        session.run().await
    });

    // Safety net: the session restores on every path it controls, but a
    // panic unwinding through the runtime must not leave the terminal raw.
    restore_terminal();

    match result {
        Ok(()) => {}
        Err(e) if e.is_clean_shutdown() => {
            info!("Session closed by remote");
            println!("\nConnection closed by remote host.");
        }
        Err(e) => {
            error!(error = %e, "Session failed");
            eprintln!("wssh: {}", e);
            std::process::exit(1);
        }
    }
}
