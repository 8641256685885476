//! Per-call request configuration.
//!
//! A [`RequestConfig`] is built once and reused across many sends; it is
//! immutable so concurrent sends through the same dispatcher can share it
//! freely. The two canonical configurations (`no_redirects`,
//! `follow_redirects`) are process-wide singletons so the hot send path
//! allocates nothing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::redirect::{AcceptAllRedirects, RedirectValidator};

static ACCEPT_ALL: AcceptAllRedirects = AcceptAllRedirects;

static NO_REDIRECTS: Lazy<RequestConfig> = Lazy::new(|| RequestConfig::builder().build());

static FOLLOW_REDIRECTS: Lazy<RequestConfig> =
    Lazy::new(|| RequestConfig::builder().follow_redirects(true).build());

/// Immutable per-call send configuration.
///
/// Controls redirect following, the per-call timeout override, observer
/// notification, and the redirect validator consulted for every hop.
///
/// # Examples
///
/// ```
/// use egress::RequestConfig;
/// use std::time::Duration;
///
/// let config = RequestConfig::builder()
///     .follow_redirects(true)
///     .timeout(Duration::from_secs(5))
///     .build();
/// assert!(config.follows_redirects());
/// ```
#[derive(Clone)]
pub struct RequestConfig {
    follow_redirects: bool,
    timeout: Option<Duration>,
    notify_observers: bool,
    validator: Option<Arc<dyn RedirectValidator>>,
}

impl RequestConfig {
    /// Starts building a configuration. Defaults: redirects not followed,
    /// no timeout override, observers notified, accept-all validator.
    pub fn builder() -> RequestConfigBuilder {
        RequestConfigBuilder {
            follow_redirects: false,
            timeout: None,
            notify_observers: true,
            validator: None,
        }
    }

    /// The canonical configuration that leaves redirect responses untouched.
    pub fn no_redirects() -> &'static RequestConfig {
        &NO_REDIRECTS
    }

    /// The canonical configuration that follows redirects with the default
    /// validator.
    pub fn follow_redirects() -> &'static RequestConfig {
        &FOLLOW_REDIRECTS
    }

    /// Whether redirect responses are chased after the initial exchange.
    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// Per-call timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether registered observers are notified for this send.
    pub fn notifies_observers(&self) -> bool {
        self.notify_observers
    }

    /// The redirect validator for this send.
    pub fn validator(&self) -> &dyn RedirectValidator {
        match &self.validator {
            Some(validator) => validator.as_ref(),
            None => &ACCEPT_ALL,
        }
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("follow_redirects", &self.follow_redirects)
            .field("timeout", &self.timeout)
            .field("notify_observers", &self.notify_observers)
            .field("custom_validator", &self.validator.is_some())
            .finish()
    }
}

/// Builder for [`RequestConfig`].
pub struct RequestConfigBuilder {
    follow_redirects: bool,
    timeout: Option<Duration>,
    notify_observers: bool,
    validator: Option<Arc<dyn RedirectValidator>>,
}

impl RequestConfigBuilder {
    /// Chase redirect responses after the initial exchange.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Override the engine-wide timeout for sends using this configuration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Suppress or enable observer notifications for sends using this
    /// configuration.
    pub fn notify_observers(mut self, notify: bool) -> Self {
        self.notify_observers = notify;
        self
    }

    /// Gate and observe redirect hops through the given validator.
    pub fn validator(mut self, validator: Arc<dyn RedirectValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Finalizes the configuration.
    pub fn build(self) -> RequestConfig {
        RequestConfig {
            follow_redirects: self.follow_redirects,
            timeout: self.timeout,
            notify_observers: self.notify_observers,
            validator: self.validator,
        }
    }
}
