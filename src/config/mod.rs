//! Engine configuration.
//!
//! This module provides:
//! - Engine constants (timeouts, redirect/retry bounds, pool sizing)
//! - The engine-wide [`ConnectionConfig`]
//! - The immutable per-call [`RequestConfig`]

mod constants;
mod request;
mod types;

// Re-export all constants
pub use constants::*;
pub use request::{RequestConfig, RequestConfigBuilder};
pub use types::{
    ClientCertificate, ConnectionConfig, LogFormat, LogLevel, ProxyConfig, ProxyCredentials,
};
