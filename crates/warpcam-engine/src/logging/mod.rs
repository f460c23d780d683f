//! `env_logger` setup for the binary. Library code only uses the `log` macros.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
