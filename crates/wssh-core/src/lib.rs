//! wssh-core: Shared library for the wssh remote-terminal protocol.
//!
//! This crate provides:
//! - Protocol message definitions and the JSON wire codec
//! - Error taxonomy shared by client components
//! - Protocol and timing constants
//! - Logging setup

pub mod constants;
pub mod error;
pub mod logging;
pub mod protocol;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
pub use protocol::{decode, Inbound, Operation, ProtocolMessage, TermSize};
