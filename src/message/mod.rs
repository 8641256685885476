//! HTTP message representation.
//!
//! This module provides:
//! - Request and response data carried through a send
//! - The message envelope with timing, identity, and attachment slots
//! - Helpers for redirect cloning and image detection
//!
//! A message owns its request for the whole send and gains a response on
//! completion. The same envelope is what observers see, so timing fields
//! and the origin flag live here rather than in the dispatcher.

use std::any::Any;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime};

use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode, Version};
use url::Url;

use crate::config::IMAGE_PATH_PATTERN;
use crate::identity::Identity;

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(IMAGE_PATH_PATTERN).unwrap_or_else(|e| {
        panic!(
            "Failed to compile regex pattern '{}': {}. This is a programming error.",
            IMAGE_PATH_PATTERN, e
        )
    })
});

/// The outbound half of a message.
#[derive(Debug, Clone)]
pub struct RequestData {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// HTTP version to send with.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body bytes.
    pub body: Vec<u8>,
}

impl RequestData {
    /// Creates request data for the given method and URL, with an HTTP/1.1
    /// version, no headers and an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        RequestData {
            method,
            url,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Whether the URL path looks like an image resource.
    pub fn is_image(&self) -> bool {
        IMAGE_RE.is_match(self.url.path())
    }
}

/// The inbound half of a message, as received from the remote peer.
#[derive(Debug, Clone)]
pub struct ResponseData {
    /// HTTP version the response was received with.
    pub version: Version,
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body bytes. Empty when the body was skipped (event
    /// streams) or streamed elsewhere (file downloads).
    pub body: Vec<u8>,
}

impl ResponseData {
    /// Whether the response declares a server-sent event stream.
    ///
    /// Event-stream bodies never end on their own, so the engine must not
    /// try to buffer them.
    pub fn is_event_stream(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .map(|value| {
                String::from_utf8_lossy(value.as_bytes())
                    .to_ascii_lowercase()
                    .contains("text/event-stream")
            })
            .unwrap_or(false)
    }

    /// Returns the `Location` header value, decoded leniently.
    ///
    /// Redirect targets in the wild are not always valid UTF-8; invalid
    /// bytes are replaced rather than dropped so the value can still be
    /// reported in errors.
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }
}

/// A request/response pair travelling through the engine.
///
/// Created with a request, sent, and completed in place: the response,
/// timing fields and origin flag are filled in by the engine. Observers
/// receive the same value, which is why request mutation is exposed
/// directly while the engine-maintained fields sit behind accessors.
pub struct HttpMessage {
    /// The request to send. Mutable up front and during observer
    /// notification; identity rewrites also happen here.
    pub request: RequestData,
    /// The response, present once a send completed. Survives a failed
    /// redirect hop with the last successfully received response.
    pub response: Option<ResponseData>,
    time_sent: Option<SystemTime>,
    elapsed: Option<Duration>,
    identity: Option<Arc<dyn Identity>>,
    from_target_host: bool,
    attachment: Option<Box<dyn Any + Send>>,
}

impl HttpMessage {
    /// Creates a message around the given request data.
    pub fn new(request: RequestData) -> Self {
        HttpMessage {
            request,
            response: None,
            time_sent: None,
            elapsed: None,
            identity: None,
            from_target_host: false,
            attachment: None,
        }
    }

    /// Creates a GET message for the given URL.
    pub fn get(url: Url) -> Self {
        HttpMessage::new(RequestData::new(Method::GET, url))
    }

    /// When the request was handed to the transport, if it has been sent.
    pub fn time_sent(&self) -> Option<SystemTime> {
        self.time_sent
    }

    pub(crate) fn set_time_sent(&mut self, time: SystemTime) {
        self.time_sent = Some(time);
    }

    /// Wall-clock duration of the last transport exchange. Recorded even
    /// when the send failed.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = Some(elapsed);
    }

    /// The identity this message should be sent as, if any.
    pub fn identity(&self) -> Option<&Arc<dyn Identity>> {
        self.identity.as_ref()
    }

    /// Attaches an identity to this message. A dispatcher-level identity,
    /// when set, takes precedence over this one.
    pub fn set_identity(&mut self, identity: Option<Arc<dyn Identity>>) {
        self.identity = identity;
    }

    /// Whether the current response came from the remote peer rather than
    /// being crafted locally.
    pub fn is_response_from_target_host(&self) -> bool {
        self.from_target_host
    }

    pub(crate) fn set_response_from_target_host(&mut self, from_target_host: bool) {
        self.from_target_host = from_target_host;
    }

    /// Stores an arbitrary value on this message, replacing any previous
    /// attachment. Used for out-of-band results such as the raw connection
    /// left over after a protocol upgrade.
    pub fn set_attachment<T: Any + Send>(&mut self, value: T) {
        self.attachment = Some(Box::new(value));
    }

    /// Removes and returns the attachment if it has the requested type.
    /// An attachment of a different type stays in place.
    pub fn take_attachment<T: Any>(&mut self) -> Option<T> {
        match self.attachment.take() {
            Some(value) => match value.downcast::<T>() {
                Ok(value) => Some(*value),
                Err(value) => {
                    self.attachment = Some(value);
                    None
                }
            },
            None => None,
        }
    }

    /// Whether an attachment is present.
    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// Creates a fresh message carrying a copy of this request and the
    /// same identity. Response, timing, and attachment do not carry over.
    pub fn clone_for_redirect(&self) -> HttpMessage {
        HttpMessage {
            request: self.request.clone(),
            response: None,
            time_sent: None,
            elapsed: None,
            identity: self.identity.clone(),
            from_target_host: false,
            attachment: None,
        }
    }

    /// Replaces this message's response with a copy of the other
    /// message's. Used to fold each redirect hop's response back onto the
    /// originally sent message.
    pub fn copy_response_from(&mut self, other: &HttpMessage) {
        self.response = other.response.clone();
        self.from_target_host = other.from_target_host;
    }
}

impl std::fmt::Debug for HttpMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMessage")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("time_sent", &self.time_sent)
            .field("elapsed", &self.elapsed)
            .field("has_identity", &self.identity.is_some())
            .field("from_target_host", &self.from_target_host)
            .field("has_attachment", &self.attachment.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_get_message_defaults() {
        let msg = HttpMessage::get(url("http://example.com/path"));
        assert_eq!(msg.request.method, Method::GET);
        assert_eq!(msg.request.version, Version::HTTP_11);
        assert!(msg.request.body.is_empty());
        assert!(msg.response.is_none());
        assert!(msg.time_sent().is_none());
        assert!(msg.elapsed().is_none());
        assert!(!msg.is_response_from_target_host());
    }

    #[test]
    fn test_image_detection_by_path_extension() {
        assert!(HttpMessage::get(url("http://example.com/logo.png"))
            .request
            .is_image());
        assert!(HttpMessage::get(url("http://example.com/a/b/photo.JPEG"))
            .request
            .is_image());
        // Query strings are not part of the path
        assert!(!HttpMessage::get(url("http://example.com/page?img=x.png"))
            .request
            .is_image());
        assert!(!HttpMessage::get(url("http://example.com/api/data"))
            .request
            .is_image());
    }

    #[test]
    fn test_event_stream_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/event-stream; charset=utf-8".parse().unwrap());
        let response = ResponseData {
            version: Version::HTTP_11,
            status: StatusCode::OK,
            headers,
            body: Vec::new(),
        };
        assert!(response.is_event_stream());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/html".parse().unwrap());
        let response = ResponseData {
            version: Version::HTTP_11,
            status: StatusCode::OK,
            headers,
            body: Vec::new(),
        };
        assert!(!response.is_event_stream());
    }

    #[test]
    fn test_attachment_round_trip() {
        let mut msg = HttpMessage::get(url("http://example.com/"));
        assert!(!msg.has_attachment());

        msg.set_attachment(42u32);
        assert!(msg.has_attachment());

        // Wrong type leaves the attachment in place
        assert_eq!(msg.take_attachment::<String>(), None);
        assert!(msg.has_attachment());

        assert_eq!(msg.take_attachment::<u32>(), Some(42));
        assert!(!msg.has_attachment());
        assert_eq!(msg.take_attachment::<u32>(), None);
    }

    #[test]
    fn test_clone_for_redirect_resets_transient_state() {
        let mut msg = HttpMessage::get(url("http://example.com/"));
        msg.set_time_sent(SystemTime::now());
        msg.set_elapsed(Duration::from_millis(12));
        msg.set_response_from_target_host(true);
        msg.set_attachment("leftover".to_string());
        msg.response = Some(ResponseData {
            version: Version::HTTP_11,
            status: StatusCode::FOUND,
            headers: HeaderMap::new(),
            body: b"moved".to_vec(),
        });

        let clone = msg.clone_for_redirect();
        assert_eq!(clone.request.url, msg.request.url);
        assert!(clone.response.is_none());
        assert!(clone.time_sent().is_none());
        assert!(clone.elapsed().is_none());
        assert!(!clone.is_response_from_target_host());
        assert!(!clone.has_attachment());
    }

    #[test]
    fn test_copy_response_from() {
        let mut original = HttpMessage::get(url("http://example.com/"));
        let mut hop = HttpMessage::get(url("http://example.com/next"));
        hop.response = Some(ResponseData {
            version: Version::HTTP_11,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: b"final".to_vec(),
        });
        hop.set_response_from_target_host(true);

        original.copy_response_from(&hop);
        let response = original.response.as_ref().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"final");
        assert!(original.is_response_from_target_host());
    }

    #[test]
    fn test_location_header_lossy_decode() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "/next".parse().unwrap());
        let response = ResponseData {
            version: Version::HTTP_11,
            status: StatusCode::MOVED_PERMANENTLY,
            headers,
            body: Vec::new(),
        };
        assert_eq!(response.location().as_deref(), Some("/next"));

        let response = ResponseData {
            version: Version::HTTP_11,
            status: StatusCode::MOVED_PERMANENTLY,
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        assert_eq!(response.location(), None);
    }
}
