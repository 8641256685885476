//! Error handling.
//!
//! This module provides:
//! - Error type definitions for initialization and send failures
//! - Transport error categorization
//!
//! Transport failures are classified into `TransportKind` values that
//! drive both log output and the retry decision in the connection pool.
//! Failures stay `SendError` variants all the way to the caller; nothing
//! in the send path panics on a remote peer's behavior.

mod categorization;
mod types;

// Re-export public API
pub use categorization::{categorize_io_error, categorize_transport_error};
pub use types::{InitializationError, SendError, TransportKind};
