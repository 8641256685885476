//! Cookie-based session state.
//!
//! This module provides:
//! - `SessionState`, a thread-safe cookie container scoped like a browser
//!   profile
//! - Helpers to produce a `Cookie` header for a URL and absorb
//!   `Set-Cookie` headers from a response
//!
//! The transport clients are shared across dispatchers with unrelated
//! session scopes, so cookie handling cannot live on the client. State is
//! applied per request instead: the dispatcher asks the selected state for
//! a `Cookie` header before sending and feeds response headers back
//! afterwards. Resetting a state means replacing the whole container, so
//! a `SessionState` itself never empties.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use url::Url;

/// A shareable cookie store with browser-style domain and path matching.
#[derive(Default)]
pub struct SessionState {
    jar: Jar,
}

impl SessionState {
    /// Creates an empty session state.
    pub fn new() -> Self {
        SessionState::default()
    }

    /// Returns the `Cookie` header to send with a request to `url`, if
    /// any stored cookie matches it.
    pub fn cookie_header_for(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }

    /// Stores the cookies a response carried for `url`. Invalid
    /// `Set-Cookie` values are ignored.
    pub fn absorb_response(&self, url: &Url, headers: &HeaderMap) {
        let mut set_cookies = headers.get_all(SET_COOKIE).iter().peekable();
        if set_cookies.peek().is_some() {
            self.jar.set_cookies(&mut set_cookies, url);
        }
    }

    /// Adds a single cookie, as if received in a response from `url`.
    pub fn add_cookie(&self, cookie: &str, url: &Url) {
        self.jar.add_cookie_str(cookie, url);
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState").finish_non_exhaustive()
    }
}
