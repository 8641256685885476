//! Request dispatching.
//!
//! This module provides:
//! - `RequestDispatcher`, the sending facade each subsystem owns
//! - The full send pipeline: observer notification, identity rewrites,
//!   session cookie selection, transport execution, and response capture
//! - Redirect following and streaming downloads built on that pipeline
//!
//! A dispatcher is created per logical sender (one per subsystem, or one
//! per worker thread) and shares the engine context with every other
//! dispatcher in the process. All settings take `&self`, so a dispatcher
//! behind an `Arc` can be reconfigured while other threads send through
//! it; per-call behavior that must not shift mid-send travels in an
//! immutable [`RequestConfig`] instead.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use reqwest::header::{COOKIE, TRANSFER_ENCODING};

use crate::config::{RequestConfig, DEFAULT_IO_RETRIES, DEFAULT_MAX_REDIRECTS};
use crate::context::EngineContext;
use crate::error_handling::SendError;
use crate::identity::Identity;
use crate::initiator::Initiator;
use crate::message::{HttpMessage, ResponseData};
use crate::redirect::{follow_redirections, is_redirect_needed};
use crate::session::SessionState;
use crate::transport::{ConnectionPool, TransportExchange};

/// Where a response body ends up.
#[derive(Clone, Copy)]
enum BodySink<'a> {
    /// Buffer the body into the stored response.
    Memory,
    /// Stream the terminal response body to a file. The stored response
    /// keeps an empty body; redirect hops on the way are buffered
    /// normally so the redirect logic can inspect them.
    File(&'a Path),
}

/// Sends HTTP messages on behalf of one subsystem.
///
/// Each send runs the same pipeline: observers see the request, identity
/// rewrites are applied, the exchange goes out over the pooled transport
/// with the selected cookie session, and the response (or the failure)
/// is reflected on the message before observers see it again. Redirects
/// are followed by re-running that pipeline per hop.
///
/// # Examples
///
/// ```no_run
/// use egress::{HttpMessage, Initiator, RequestDispatcher};
/// use url::Url;
///
/// let dispatcher = RequestDispatcher::with_global_context(Initiator::MANUAL_REQUEST);
/// let mut message = HttpMessage::get(Url::parse("http://example.com/")?);
/// dispatcher.send(&mut message)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RequestDispatcher {
    context: Arc<EngineContext>,
    initiator: Initiator,
    pool: ConnectionPool,
    identity: Mutex<Option<Arc<dyn Identity>>>,
    use_cookies: AtomicBool,
    use_global_state: AtomicBool,
    private_session: Mutex<Arc<SessionState>>,
    follow_redirects: AtomicBool,
    max_redirects: AtomicU32,
    max_retries: AtomicU32,
}

impl RequestDispatcher {
    /// Creates a dispatcher bound to `context`, sending as `initiator`.
    ///
    /// Defaults: cookies enabled, global session mode, redirects not
    /// followed. The update checker gets full certificate validation;
    /// every other initiator accepts whatever certificate the target
    /// presents, since scan targets routinely have broken TLS.
    pub fn new(context: Arc<EngineContext>, initiator: Initiator) -> Self {
        let strict_tls = initiator == Initiator::CHECK_FOR_UPDATES;
        RequestDispatcher {
            pool: ConnectionPool::new(context.clone(), strict_tls),
            context,
            initiator,
            identity: Mutex::new(None),
            use_cookies: AtomicBool::new(true),
            use_global_state: AtomicBool::new(true),
            private_session: Mutex::new(Arc::new(SessionState::new())),
            follow_redirects: AtomicBool::new(false),
            max_redirects: AtomicU32::new(DEFAULT_MAX_REDIRECTS),
            max_retries: AtomicU32::new(DEFAULT_IO_RETRIES),
        }
    }

    /// Creates a dispatcher bound to the process-wide context.
    pub fn with_global_context(initiator: Initiator) -> Self {
        RequestDispatcher::new(EngineContext::global(), initiator)
    }

    /// The initiator this dispatcher sends as.
    pub fn initiator(&self) -> Initiator {
        self.initiator
    }

    /// The engine context this dispatcher is bound to.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Sets (or clears) the identity every message is sent as. A message
    /// carrying its own identity is unaffected only when this is `None`.
    pub fn set_identity(&self, identity: Option<Arc<dyn Identity>>) {
        *self.identity.lock().unwrap() = identity;
    }

    /// The dispatcher-wide identity override, if any.
    pub fn identity(&self) -> Option<Arc<dyn Identity>> {
        self.identity.lock().unwrap().clone()
    }

    /// Enables or disables cookie handling. Switching modes discards the
    /// dispatcher's private session.
    pub fn set_use_cookies(&self, use_cookies: bool) {
        self.use_cookies.store(use_cookies, Ordering::SeqCst);
        self.check_state();
    }

    /// Switches between the shared global session and a private one.
    /// Entering private mode starts from an empty session.
    pub fn set_use_global_state(&self, use_global_state: bool) {
        self.use_global_state.store(use_global_state, Ordering::SeqCst);
        self.check_state();
    }

    /// Whether sends currently go out with the shared global session.
    pub fn is_global_state_enabled(&self) -> bool {
        self.use_cookies.load(Ordering::SeqCst)
            && self.use_global_state.load(Ordering::SeqCst)
            && self.context.connection_config().global_session_enabled
    }

    /// Whether [`send`](Self::send) chases redirect responses.
    pub fn set_follow_redirects(&self, follow: bool) {
        self.follow_redirects.store(follow, Ordering::SeqCst);
    }

    /// Current redirect-following default for [`send`](Self::send).
    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects.load(Ordering::SeqCst)
    }

    /// Caps the number of redirect hops followed per send.
    pub fn set_max_redirects(&self, max_redirects: u32) {
        self.max_redirects.store(max_redirects, Ordering::SeqCst);
    }

    /// Sets how many times the transport retries an exchange after a
    /// connection-level failure. Timeouts are never retried.
    pub fn set_max_retries_on_io_error(&self, retries: u32) {
        self.max_retries.store(retries, Ordering::SeqCst);
    }

    /// Releases the pooled connections. The dispatcher stays usable; the
    /// next send opens fresh connections.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Sends `message` and fills in its response in place, using the
    /// dispatcher's current redirect-following default.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::InvalidArgument`] for non-HTTP request URLs,
    /// [`SendError::Transport`] when the exchange fails after the
    /// configured retries, and [`SendError::InvalidRedirect`] when a
    /// redirect target cannot be parsed. On error the message keeps the
    /// last response received, if any, along with its timing fields.
    pub fn send(&self, message: &mut HttpMessage) -> Result<(), SendError> {
        self.send_with_config(message, self.default_config())
    }

    /// Sends `message` under an explicit per-call configuration.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_with_config(
        &self,
        message: &mut HttpMessage,
        config: &RequestConfig,
    ) -> Result<(), SendError> {
        self.send_pipeline(message, config, BodySink::Memory)
    }

    /// Sends `message` and streams the terminal response body to `path`
    /// instead of buffering it; the stored response body stays empty.
    /// Redirects are followed according to the dispatcher default, with
    /// intermediate hop bodies buffered in memory as usual.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); additionally fails with a transport
    /// error when the file cannot be created or written.
    pub fn send_to_file(&self, message: &mut HttpMessage, path: &Path) -> Result<(), SendError> {
        self.send_pipeline(message, self.default_config(), BodySink::File(path))
    }

    /// Like [`send_to_file`](Self::send_to_file), but with an explicit
    /// per-request configuration instead of the dispatcher defaults.
    pub fn send_to_file_with_config(
        &self,
        message: &mut HttpMessage,
        config: &RequestConfig,
        path: &Path,
    ) -> Result<(), SendError> {
        self.send_pipeline(message, config, BodySink::File(path))
    }

    fn default_config(&self) -> &'static RequestConfig {
        if self.follow_redirects.load(Ordering::SeqCst) {
            RequestConfig::follow_redirects()
        } else {
            RequestConfig::no_redirects()
        }
    }

    fn send_pipeline(
        &self,
        message: &mut HttpMessage,
        config: &RequestConfig,
        sink: BodySink<'_>,
    ) -> Result<(), SendError> {
        self.send_impl(message, config, sink)?;
        if config.follows_redirects() {
            let max_redirects = self.max_redirects.load(Ordering::SeqCst);
            follow_redirections(message, config, max_redirects, |hop| {
                self.send_impl(hop, config, sink)
            })?;
        }
        Ok(())
    }

    /// One non-redirecting exchange, with observer notification on both
    /// sides and timing recorded on every exit path.
    fn send_impl(
        &self,
        message: &mut HttpMessage,
        config: &RequestConfig,
        sink: BodySink<'_>,
    ) -> Result<(), SendError> {
        log::debug!("Sending {} {}", message.request.method, message.request.url);
        message.set_time_sent(SystemTime::now());
        let started = Instant::now();

        let result = (|| -> Result<(), SendError> {
            if config.notifies_observers() {
                self.context
                    .observers()
                    .notify_request_sent(message, self.initiator, self);
            }
            validate_request(message)?;
            self.send_authenticated(message, config, sink)
        })();

        // Timing and the response-side notification happen whether the
        // exchange succeeded or not.
        let elapsed = started.elapsed();
        message.set_elapsed(elapsed);
        log::debug!(
            "Received response after {}ms for {} {}",
            elapsed.as_millis(),
            message.request.method,
            message.request.url
        );
        if config.notifies_observers() {
            self.context
                .observers()
                .notify_response_received(message, self.initiator, self);
        }
        result
    }

    fn send_authenticated(
        &self,
        message: &mut HttpMessage,
        config: &RequestConfig,
        sink: BodySink<'_>,
    ) -> Result<(), SendError> {
        let identity = self.effective_identity(message);

        if let Some(identity) = &identity {
            if self.initiator == Initiator::AUTHENTICATION_POLL {
                identity.process_message_to_match_session(message);
            } else if self.initiator != Initiator::AUTHENTICATION {
                identity.process_message_to_match_identity(message);
            }
        }

        self.send_once(message, identity.as_deref(), config, sink)?;

        if self.initiator != Initiator::AUTHENTICATION
            && self.initiator != Initiator::AUTHENTICATION_POLL
        {
            if let Some(identity) = &identity {
                if !message.request.is_image() && !identity.is_authenticated(message) {
                    log::debug!(
                        "First attempt to {} not authenticated, re-authenticating and trying again",
                        message.request.url
                    );
                    identity.queue_reauthentication(message);
                    identity.process_message_to_match_identity(message);
                    self.send_once(message, Some(identity.as_ref()), config, sink)?;
                }
            }
        }
        Ok(())
    }

    fn effective_identity(&self, message: &HttpMessage) -> Option<Arc<dyn Identity>> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .or_else(|| message.identity().cloned())
    }

    /// One transport exchange: cookies in, request out, response onto the
    /// message, cookies absorbed back.
    fn send_once(
        &self,
        message: &mut HttpMessage,
        identity: Option<&dyn Identity>,
        config: &RequestConfig,
        sink: BodySink<'_>,
    ) -> Result<(), SendError> {
        let session = self.select_session(identity);
        if let Some(session) = &session {
            if let Some(cookie) = session.cookie_header_for(&message.request.url) {
                message.request.headers.insert(COOKIE, cookie);
            }
        }

        let exchange = self.pool.execute(
            &message.request,
            config.timeout(),
            self.max_retries.load(Ordering::SeqCst),
        )?;
        self.finalize_response(message, exchange, session.as_deref(), config, sink)
    }

    /// Picks the cookie store for one exchange. An identity's dedicated
    /// session always wins; otherwise the dispatcher's cookie mode
    /// decides between the shared global session, the private session,
    /// and no cookies at all.
    fn select_session(&self, identity: Option<&dyn Identity>) -> Option<Arc<SessionState>> {
        if let Some(session) = identity.and_then(|identity| identity.session_state()) {
            return Some(session);
        }
        if !self.use_cookies.load(Ordering::SeqCst) {
            return None;
        }
        if self.use_global_state.load(Ordering::SeqCst) {
            if self.context.connection_config().global_session_enabled {
                Some(self.context.global_session())
            } else {
                None
            }
        } else {
            Some(self.private_session.lock().unwrap().clone())
        }
    }

    /// Both cookie-mode flags reset the private session when they leave
    /// it unused, so re-entering private mode always starts clean.
    fn check_state(&self) {
        let use_cookies = self.use_cookies.load(Ordering::SeqCst);
        let use_global_state = self.use_global_state.load(Ordering::SeqCst);
        if !use_cookies || !use_global_state {
            *self.private_session.lock().unwrap() = Arc::new(SessionState::new());
        }
    }

    fn finalize_response(
        &self,
        message: &mut HttpMessage,
        exchange: TransportExchange,
        session: Option<&SessionState>,
        config: &RequestConfig,
        sink: BodySink<'_>,
    ) -> Result<(), SendError> {
        match exchange {
            TransportExchange::Pooled(response) => {
                let version = response.version();
                let status = response.status();
                let mut headers = response.headers().clone();
                // The pooled client decodes any transfer encoding while
                // reading, so the header no longer describes the body.
                headers.remove(TRANSFER_ENCODING);

                let mut data = ResponseData {
                    version,
                    status,
                    headers,
                    body: Vec::new(),
                };

                if data.is_event_stream() {
                    // An event stream never ends; leave the body empty
                    // instead of reading until the timeout.
                } else {
                    match sink {
                        BodySink::Memory => {
                            data.body = response
                                .bytes()
                                .map_err(|e| SendError::transport(e, 1))?
                                .to_vec();
                        }
                        BodySink::File(path) => {
                            if config.follows_redirects() && is_redirect_needed(status) {
                                // A redirect hop is buffered like a normal
                                // response; only the terminal response
                                // reaches the file.
                                data.body = response
                                    .bytes()
                                    .map_err(|e| SendError::transport(e, 1))?
                                    .to_vec();
                            } else {
                                let mut file =
                                    File::create(path).map_err(|e| SendError::transport_io(e, 1))?;
                                let mut response = response;
                                response
                                    .copy_to(&mut file)
                                    .map_err(|e| SendError::transport(e, 1))?;
                            }
                        }
                    }
                }
                message.response = Some(data);
            }
            TransportExchange::Raw { response, upgraded } => {
                message.response = Some(response);
                if let Some(connection) = upgraded {
                    message.set_attachment(connection);
                }
            }
        }

        if let Some(session) = session {
            if let Some(response) = &message.response {
                session.absorb_response(&message.request.url, &response.headers);
            }
        }
        message.set_response_from_target_host(true);
        Ok(())
    }
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("initiator", &self.initiator)
            .field("use_cookies", &self.use_cookies.load(Ordering::SeqCst))
            .field(
                "use_global_state",
                &self.use_global_state.load(Ordering::SeqCst),
            )
            .field(
                "follow_redirects",
                &self.follow_redirects.load(Ordering::SeqCst),
            )
            .finish_non_exhaustive()
    }
}

fn validate_request(message: &HttpMessage) -> Result<(), SendError> {
    let url = &message.request.url;
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(SendError::InvalidArgument(format!(
                "unsupported scheme {:?} in {}",
                scheme, url
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(SendError::InvalidArgument(format!(
            "request URL has no host: {}",
            url
        )));
    }
    Ok(())
}
