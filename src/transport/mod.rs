//! Connection pooling and request execution.
//!
//! This module provides:
//! - `ConnectionPool`, the per-dispatcher wrapper around pooled HTTP
//!   clients
//! - Bounded retry of connection-level failures
//! - Routing of connection-upgrade requests to the one-off raw transport
//!
//! Clients are built from the engine's connection configuration and kept
//! until the configuration generation moves on, at which point the next
//! send rebuilds them. Certificate checking is relaxed by default, as
//! security-testing targets rarely present clean certificates; pools
//! created for the updater keep strict checking.

mod upgrade;

pub use upgrade::UpgradedConnection;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, CONNECTION};
use reqwest::redirect;

use crate::config::{ConnectionConfig, ProxyConfig, POOL_MAX_IDLE_PER_HOST};
use crate::context::EngineContext;
use crate::error_handling::{categorize_transport_error, SendError};
use crate::message::{RequestData, ResponseData};

/// The transport-level outcome of one exchange.
#[derive(Debug)]
pub(crate) enum TransportExchange {
    /// Response from a pooled client, body not yet consumed.
    Pooled(Response),
    /// Response from the raw upgrade transport. `upgraded` carries the
    /// live connection when the peer switched protocols.
    Raw {
        response: ResponseData,
        upgraded: Option<UpgradedConnection>,
    },
}

struct ClientCache {
    generation: u64,
    client: Client,
}

/// Per-dispatcher transport: pooled clients plus the upgrade bypass.
pub(crate) struct ConnectionPool {
    context: Arc<EngineContext>,
    strict_tls: bool,
    cache: Mutex<Option<ClientCache>>,
}

impl ConnectionPool {
    pub(crate) fn new(context: Arc<EngineContext>, strict_tls: bool) -> Self {
        ConnectionPool {
            context,
            strict_tls,
            cache: Mutex::new(None),
        }
    }

    /// Performs one request/response exchange.
    ///
    /// Connection-level failures are retried up to `max_retries`
    /// additional times; timeouts and construction errors are not.
    /// Connection-upgrade requests bypass the pool entirely.
    pub(crate) fn execute(
        &self,
        request: &RequestData,
        timeout_override: Option<Duration>,
        max_retries: u32,
    ) -> Result<TransportExchange, SendError> {
        if is_connection_upgrade(&request.headers) {
            let config = self.context.connection_config();
            let (response, upgraded) =
                upgrade::execute_upgrade(request, &config, self.strict_tls, timeout_override)?;
            return Ok(TransportExchange::Raw { response, upgraded });
        }

        let client = self.client()?;
        let attempts_allowed = max_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_send(&client, request, timeout_override) {
                Ok(response) => return Ok(TransportExchange::Pooled(response)),
                Err(error) => {
                    let kind = categorize_transport_error(&error);
                    if kind.is_retryable() && attempt < attempts_allowed {
                        log::debug!(
                            "Retrying {} (attempt {} of {}): {}",
                            request.url,
                            attempt,
                            attempts_allowed,
                            error
                        );
                        continue;
                    }
                    return Err(SendError::Transport {
                        kind,
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            }
        }
    }

    fn try_send(
        &self,
        client: &Client,
        request: &RequestData,
        timeout_override: Option<Duration>,
    ) -> Result<Response, reqwest::Error> {
        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .version(request.version)
            .headers(request.headers.clone());
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        if let Some(timeout) = timeout_override {
            builder = builder.timeout(timeout);
        }
        builder.send()
    }

    fn client(&self) -> Result<Client, SendError> {
        let generation = self.context.generation();
        let mut cache = self.cache.lock().unwrap();
        if let Some(cached) = cache.as_ref() {
            if cached.generation == generation {
                return Ok(cached.client.clone());
            }
        }

        let config = self.context.connection_config();
        let client = build_client(&config, self.strict_tls)?;
        *cache = Some(ClientCache {
            generation,
            client: client.clone(),
        });
        Ok(client)
    }

    /// Drops the cached clients and with them all pooled connections. The
    /// pool stays usable; the next send builds a fresh client.
    pub(crate) fn shutdown(&self) {
        *self.cache.lock().unwrap() = None;
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("strict_tls", &self.strict_tls)
            .finish_non_exhaustive()
    }
}

fn build_client(config: &ConnectionConfig, strict_tls: bool) -> Result<Client, SendError> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .redirect(redirect::Policy::none())
        .referer(false)
        .timeout(config.default_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .http1_title_case_headers();

    if !strict_tls {
        builder = builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    if let Some(proxy_config) = &config.proxy {
        let mut proxy = reqwest::Proxy::all(proxy_config.url())
            .map_err(|e| SendError::transport(e, 1))?;
        if let Some(credentials) = &proxy_config.credentials {
            proxy = proxy.basic_auth(&credentials.username, &credentials.password);
        }
        if !proxy_config.exclude_hosts.is_empty() {
            proxy = proxy.no_proxy(reqwest::NoProxy::from_string(
                &proxy_config.exclude_hosts.join(","),
            ));
        }
        builder = builder.proxy(proxy);
    }

    if config.use_client_certificate {
        if let Some(certificate) = &config.client_certificate {
            let identity = reqwest::Identity::from_pkcs12_der(
                &certificate.pkcs12_der,
                &certificate.password,
            )
            .map_err(|e| SendError::transport(e, 1))?;
            builder = builder.identity(identity);
        }
    }

    builder.build().map_err(|e| SendError::transport(e, 1))
}

/// Whether the request asks the server for a connection upgrade.
pub(crate) fn is_connection_upgrade(headers: &HeaderMap) -> bool {
    headers.get_all(CONNECTION).iter().any(|value| {
        value
            .to_str()
            .map(|value| {
                value
                    .split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
            })
            .unwrap_or(false)
    })
}

/// Whether requests to `host` go through the configured proxy, honoring
/// the exclusion list (exact match or subdomain of an excluded host).
pub(crate) fn proxy_applies(proxy: &ProxyConfig, host: &str) -> bool {
    !proxy.exclude_hosts.iter().any(|excluded| {
        if host.eq_ignore_ascii_case(excluded) {
            return true;
        }
        host.len() > excluded.len() + 1
            && host.as_bytes()[host.len() - excluded.len() - 1] == b'.'
            && host[host.len() - excluded.len()..].eq_ignore_ascii_case(excluded)
    })
}
