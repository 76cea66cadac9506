//! Logging utilities.
//!
//! The engine logs through the `log` facade only; this module installs an
//! `env_logger` backend for binaries that do not bring their own.

mod init;

pub use init::{init_logging, LoggingConfig};
