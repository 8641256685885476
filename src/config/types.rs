//! Engine configuration types.
//!
//! Defines the engine-wide connection configuration and the CLI-facing
//! logging enums.

use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{CONNECT_TIMEOUT, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};

/// Logging level for the engine and CLI.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Credentials for the upstream proxy.
#[derive(Debug, Clone)]
pub struct ProxyCredentials {
    /// Proxy account name
    pub username: String,
    /// Proxy account password
    pub password: String,
}

/// Upstream proxy configuration.
///
/// All pooled traffic is tunneled through this proxy when set, except for
/// hosts listed in `exclude_hosts`. Credentials are injected as Basic auth
/// on every connection, including CONNECT tunnels opened by the upgrade
/// path.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy host name or address
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Optional Basic credentials
    pub credentials: Option<ProxyCredentials>,
    /// Hosts that bypass the proxy (exact names, or `.suffix` domain patterns
    /// as understood by the client's no-proxy matching)
    pub exclude_hosts: Vec<String>,
}

impl ProxyConfig {
    /// Returns the proxy endpoint as a URL string.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Client certificate presented during the TLS handshake, when enabled.
///
/// Stored as a PKCS#12 archive, the format the certificate subsystem hands
/// over for active identities.
#[derive(Debug, Clone)]
pub struct ClientCertificate {
    /// DER-encoded PKCS#12 archive
    pub pkcs12_der: Vec<u8>,
    /// Archive password
    pub password: String,
}

/// Engine-wide connection configuration.
///
/// Shared by every dispatcher attached to the same [`EngineContext`]; updates
/// take effect on the very next send because transports rebuild their clients
/// whenever the configuration generation changes.
///
/// [`EngineContext`]: crate::EngineContext
///
/// # Examples
///
/// ```
/// use egress::ConnectionConfig;
/// use std::time::Duration;
///
/// let config = ConnectionConfig {
///     default_timeout: Duration::from_secs(10),
///     global_session_enabled: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Per-request timeout applied when the per-call configuration does not
    /// override it
    pub default_timeout: Duration,

    /// TCP connection timeout
    pub connect_timeout: Duration,

    /// User-Agent header applied to requests that do not set their own
    pub user_agent: String,

    /// Whether the shared global session state may be used.
    ///
    /// Dispatchers in global mode fall back to disabled cookies while this
    /// is false. When true, cookies set by one subsystem are visible to
    /// every other subsystem in global mode, which is the intended
    /// browser-like behavior.
    pub global_session_enabled: bool,

    /// Upstream proxy, if any
    pub proxy: Option<ProxyConfig>,

    /// Whether the client certificate is presented during TLS handshakes
    pub use_client_certificate: bool,

    /// Certificate presented when [`use_client_certificate`] is set
    ///
    /// [`use_client_certificate`]: Self::use_client_certificate
    pub client_certificate: Option<ClientCertificate>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            global_session_enabled: false,
            proxy: None,
            use_client_certificate: false,
            client_certificate: None,
        }
    }
}
