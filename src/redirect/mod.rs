//! Redirect following.
//!
//! This module handles following redirect chains manually, one hop at a
//! time, so that every intermediate exchange is observable and subject to
//! validation. Hops are sent as fresh cloned messages; after each one the
//! originally sent message is updated to carry the latest response, so a
//! caller always ends up with the final state no matter where the chain
//! stopped.

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::config::RequestConfig;
use crate::error_handling::SendError;
use crate::message::{HttpMessage, RequestData};

/// Decides whether redirects are followed and observes each exchange.
///
/// The validator is consulted before each hop is sent; returning `false`
/// from [`is_valid`](RedirectValidator::is_valid) ends the chain without
/// error. It is also notified of every exchanged message, the initial one
/// included, which lets callers record the full path a request took.
pub trait RedirectValidator: Send + Sync {
    /// Whether the chain may proceed to the given target.
    fn is_valid(&self, url: &Url) -> bool;

    /// Called for each exchanged message: the initial send and every
    /// followed hop, in order.
    fn notify_message_received(&self, message: &HttpMessage);
}

/// The default validator: every redirect is followed, nothing is recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllRedirects;

impl RedirectValidator for AcceptAllRedirects {
    fn is_valid(&self, _url: &Url) -> bool {
        true
    }

    fn notify_message_received(&self, _message: &HttpMessage) {}
}

/// Whether the status code asks for a redirect (301, 302, 303, 307, 308).
pub fn is_redirect_needed(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Resolves a `Location` header value against the URL of the request that
/// received it.
///
/// Absolute locations are used as-is. Anything else (path-relative,
/// scheme-relative, or unencoded values that only parse once joined) is
/// resolved against the base URL.
///
/// # Errors
///
/// Returns [`SendError::InvalidRedirect`] when the value survives neither
/// pass.
pub fn resolve_redirect_target(location: &str, base: &Url) -> Result<Url, SendError> {
    Url::parse(location).or_else(|parse_error| {
        base.join(location).map_err(|_| SendError::InvalidRedirect {
            location: location.to_string(),
            source: parse_error,
        })
    })
}

/// Whether the followed request must be rewritten into a GET.
///
/// For status codes 301 and 302 only POST requests are rewritten; for 303
/// every method except GET and HEAD is. 307 and 308 never rewrite.
pub fn is_request_rewrite_needed(status: StatusCode, method: &Method) -> bool {
    match status.as_u16() {
        301 | 302 => *method == Method::POST,
        303 => !(*method == Method::GET || *method == Method::HEAD),
        _ => false,
    }
}

/// Rewrites a request into a body-less GET, dropping the headers that
/// described the body.
pub fn downgrade_to_get(request: &mut RequestData) {
    request.method = Method::GET;
    request.headers.remove(CONTENT_TYPE);
    request.headers.remove(CONTENT_LENGTH);
    request.body.clear();
}

/// Follows the redirect chain starting from the response already present
/// on `message`.
///
/// Each hop is built by cloning the previous request, resolving the
/// `Location` target, and applying the GET rewrite where required; the
/// hop is then sent through `send_hop`. After every hop the original
/// `message` receives a copy of the hop's response. The chain ends at the
/// first non-redirect response, a missing `Location` header, a target the
/// validator rejects, or after `max_redirects` hops.
///
/// # Errors
///
/// Fails when a `Location` value cannot be resolved or when sending a hop
/// fails; in both cases `message` keeps the last response received.
pub(crate) fn follow_redirections<F>(
    message: &mut HttpMessage,
    config: &RequestConfig,
    max_redirects: u32,
    mut send_hop: F,
) -> Result<(), SendError>
where
    F: FnMut(&mut HttpMessage) -> Result<(), SendError>,
{
    let validator = config.validator();
    validator.notify_message_received(message);

    let mut current: Option<HttpMessage> = None;
    for _ in 0..max_redirects {
        let last = current.as_ref().unwrap_or(&*message);
        let mut hop = match next_hop(last, validator)? {
            Some(hop) => hop,
            None => break,
        };

        send_hop(&mut hop)?;
        validator.notify_message_received(&hop);

        message.copy_response_from(&hop);
        current = Some(hop);
    }
    Ok(())
}

/// Builds the next hop from the last exchanged message, or `None` when
/// the chain is complete.
fn next_hop(
    last: &HttpMessage,
    validator: &dyn RedirectValidator,
) -> Result<Option<HttpMessage>, SendError> {
    let response = match last.response.as_ref() {
        Some(response) => response,
        None => return Ok(None),
    };
    if !is_redirect_needed(response.status) {
        return Ok(None);
    }

    let location = match response.location() {
        Some(location) => location,
        None => {
            // Redirect status but no Location header: treat as terminal.
            log::debug!(
                "Redirect status {} for {} but no Location header",
                response.status,
                last.request.url
            );
            return Ok(None);
        }
    };

    let target = resolve_redirect_target(&location, &last.request.url)?;
    if !validator.is_valid(&target) {
        return Ok(None);
    }

    let mut hop = last.clone_for_redirect();
    if is_request_rewrite_needed(response.status, &hop.request.method) {
        downgrade_to_get(&mut hop.request);
    }
    hop.request.url = target;
    Ok(Some(hop))
}
