//! Logger initialization.
//!
//! The crate itself only logs through the `log` facade; binaries and tests pick
//! the `env_logger` setup here.

mod init;

pub use init::{LoggingConfig, init_logging};
