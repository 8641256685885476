//! Engine initialization.
//!
//! This module provides:
//! - Logger setup with plain (colored) and JSON output formats
//! - One-time crypto provider installation for the raw TLS path
//!
//! Both functions are idempotent so tests and embedding applications can
//! call them without coordinating a single initialization site.

mod logger;

use rustls::crypto::{ring::default_provider, CryptoProvider};

pub use logger::init_logger_with;

/// Installs `ring` as the process-wide crypto provider.
///
/// The engine pins its own provider for raw TLS connections, so sending
/// works without this call. It is here for embedders whose other `rustls`
/// users expect a process default. Calling it again after the first
/// installation has no effect.
pub fn init_crypto_provider() {
    let _ = CryptoProvider::install_default(default_provider());
}
