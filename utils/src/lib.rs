//! Shared utilities for the Nexus trust subsystem.

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingError};
