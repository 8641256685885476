//! Error categorization.
//!
//! This module provides functions to map transport-layer errors onto the
//! `TransportKind` taxonomy used for logging and retry decisions.

use std::io;

use super::types::TransportKind;

/// Categorizes a `reqwest::Error` into a `TransportKind`.
///
/// This is the unified categorization logic used by both the retry loop
/// and `SendError` construction to ensure consistency.
///
/// # Arguments
///
/// * `error` - The `reqwest::Error` to categorize
///
/// # Returns
///
/// The appropriate `TransportKind` for the error.
pub fn categorize_transport_error(error: &reqwest::Error) -> TransportKind {
    // Timeout first: reqwest reports timeouts as request errors too, and
    // the timeout classification must win so they are never retried.
    if error.is_timeout() {
        TransportKind::Timeout
    } else if error.is_builder() {
        TransportKind::Builder
    } else if error.is_connect() {
        TransportKind::Connect
    } else if error.is_body() {
        TransportKind::Body
    } else if error.is_decode() {
        TransportKind::Decode
    } else if error.is_request() {
        TransportKind::Request
    } else {
        TransportKind::Other
    }
}

/// Categorizes a `std::io::Error` from the raw-socket paths (connection
/// upgrades, response streaming to disk) into a `TransportKind`.
pub fn categorize_io_error(error: &io::Error) -> TransportKind {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportKind::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => TransportKind::Connect,
        _ => TransportKind::Io,
    }
}
