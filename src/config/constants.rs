//! Engine constants.
//!
//! Defaults for timeouts, redirect and retry bounds, connection pooling,
//! and request identification.

use std::time::Duration;

// Network operation timeouts
/// Default per-request timeout.
/// Applied when neither the engine configuration nor the per-call request
/// configuration overrides it. Generous because scan targets are routinely
/// slow, throttled, or sitting behind rate limiters.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
/// TCP connection timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// Redirect handling
/// Maximum number of redirect hops followed per send.
/// Prevents infinite redirect loops while staying far above anything a
/// well-behaved chain needs. Adjustable per engine instance.
pub const DEFAULT_MAX_REDIRECTS: u32 = 100;

// Transport retry
/// Additional transport attempts after the first I/O failure.
/// Connection-level errors only; timeouts and request construction errors
/// are never retried. Independent of the single authentication recovery
/// retry, which happens a layer above the transport.
pub const DEFAULT_IO_RETRIES: u32 = 3;

// Connection pooling
/// Idle connections kept per host.
/// Effectively unbounded: concurrent scans must not serialize behind a
/// small connection cap.
pub const POOL_MAX_IDLE_PER_HOST: usize = 10_000;

/// Default User-Agent string for outgoing requests.
///
/// A generic Chrome-like string without a specific version number to avoid
/// becoming outdated. Override it in the engine configuration or by setting
/// the header on individual messages.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Request paths matching this pattern are treated as image fetches.
/// Image requests are exempt from the authentication recovery retry.
pub const IMAGE_PATH_PATTERN: &str = r"(?i)\.(gif|jpe?g|png|bmp|ico|webp|svg|tiff?)$";
