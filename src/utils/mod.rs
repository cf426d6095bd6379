//! The `utils` module provides the error types and logging setup shared
//! across the `edge-relay` crate.

pub mod error;
pub mod logging;

pub use error::{ClientError, EventKind, LoggingError, ModuleError, RelayError};
