//! Identity hooks and the single-shot authentication recovery.
//!
//! A stub identity counts every hook invocation, so each test can pin
//! down exactly which rewrites ran and how many requests reached the
//! server. The mock server's expectation counts double as the "never a
//! third attempt" check.

mod helpers;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use httptest::{matchers::*, responders::*, Expectation, Server};
use reqwest::header::HeaderValue;

use egress::{EngineContext, HttpMessage, Identity, Initiator, RequestDispatcher};

use helpers::{get_message, manual_dispatcher};

/// Counts hook invocations and reports a fixed authentication verdict.
struct StubIdentity {
    authenticated: AtomicBool,
    reauth_requests: AtomicUsize,
    identity_rewrites: AtomicUsize,
    session_rewrites: AtomicUsize,
}

impl StubIdentity {
    fn new(authenticated: bool) -> Arc<StubIdentity> {
        Arc::new(StubIdentity {
            authenticated: AtomicBool::new(authenticated),
            reauth_requests: AtomicUsize::new(0),
            identity_rewrites: AtomicUsize::new(0),
            session_rewrites: AtomicUsize::new(0),
        })
    }

    fn reauth_requests(&self) -> usize {
        self.reauth_requests.load(Ordering::SeqCst)
    }

    fn identity_rewrites(&self) -> usize {
        self.identity_rewrites.load(Ordering::SeqCst)
    }

    fn session_rewrites(&self) -> usize {
        self.session_rewrites.load(Ordering::SeqCst)
    }
}

impl Identity for StubIdentity {
    fn is_authenticated(&self, _message: &HttpMessage) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn queue_reauthentication(&self, _message: &HttpMessage) {
        self.reauth_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn process_message_to_match_identity(&self, message: &mut HttpMessage) {
        self.identity_rewrites.fetch_add(1, Ordering::SeqCst);
        message
            .request
            .headers
            .insert("x-auth-token", HeaderValue::from_static("stub-token"));
    }

    fn process_message_to_match_session(&self, _message: &mut HttpMessage) {
        self.session_rewrites.fetch_add(1, Ordering::SeqCst);
    }
}

/// An exchange the identity rejects is retried exactly once, after a
/// queued re-authentication and a fresh identity rewrite.
#[test]
fn test_unauthenticated_response_triggers_one_recovery() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/app"),
            request::headers(contains(("x-auth-token", "stub-token"))),
        ])
        .times(2)
        .respond_with(status_code(200).body("login please")),
    );

    let identity = StubIdentity::new(false);
    let dispatcher = manual_dispatcher();
    dispatcher.set_identity(Some(identity.clone() as Arc<dyn Identity>));

    let mut message = get_message(&format!("http://{}/app", server.addr()));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(identity.reauth_requests(), 1);
    assert_eq!(identity.identity_rewrites(), 2);
    assert_eq!(identity.session_rewrites(), 0);
    assert_eq!(
        message.response.as_ref().map(|r| r.status.as_u16()),
        Some(200)
    );
}

/// An authenticated exchange goes out once, rewritten once.
#[test]
fn test_authenticated_exchange_sends_once() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/app"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let identity = StubIdentity::new(true);
    let dispatcher = manual_dispatcher();
    dispatcher.set_identity(Some(identity.clone() as Arc<dyn Identity>));

    let mut message = get_message(&format!("http://{}/app", server.addr()));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(identity.reauth_requests(), 0);
    assert_eq!(identity.identity_rewrites(), 1);
}

/// The authentication initiator itself gets no rewrite and no recovery:
/// its requests must go out exactly as the authenticator built them.
#[test]
fn test_authentication_initiator_sends_untouched() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/login"),
            request::headers(not(contains(key("x-auth-token")))),
        ])
        .times(1)
        .respond_with(status_code(200)),
    );

    let identity = StubIdentity::new(false);
    let dispatcher =
        RequestDispatcher::new(EngineContext::with_defaults(), Initiator::AUTHENTICATION);
    dispatcher.set_identity(Some(identity.clone() as Arc<dyn Identity>));

    let mut message = get_message(&format!("http://{}/login", server.addr()));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(identity.reauth_requests(), 0);
    assert_eq!(identity.identity_rewrites(), 0);
    assert_eq!(identity.session_rewrites(), 0);
}

/// Session polling matches the session without forcing authentication,
/// and never recovers: it exists to observe the session state.
#[test]
fn test_poll_initiator_matches_session_only() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/poll"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let identity = StubIdentity::new(false);
    let dispatcher = RequestDispatcher::new(
        EngineContext::with_defaults(),
        Initiator::AUTHENTICATION_POLL,
    );
    dispatcher.set_identity(Some(identity.clone() as Arc<dyn Identity>));

    let mut message = get_message(&format!("http://{}/poll", server.addr()));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(identity.session_rewrites(), 1);
    assert_eq!(identity.identity_rewrites(), 0);
    assert_eq!(identity.reauth_requests(), 0);
}

/// Image fetches are rewritten like any request but never trigger the
/// recovery retry.
#[test]
fn test_image_requests_skip_recovery() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/assets/logo.png"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let identity = StubIdentity::new(false);
    let dispatcher = manual_dispatcher();
    dispatcher.set_identity(Some(identity.clone() as Arc<dyn Identity>));

    let mut message = get_message(&format!("http://{}/assets/logo.png", server.addr()));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(identity.reauth_requests(), 0);
    assert_eq!(identity.identity_rewrites(), 1);
}

/// A message-level identity drives the send when the dispatcher has
/// none of its own.
#[test]
fn test_message_identity_used_when_dispatcher_has_none() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/app"))
            .times(2)
            .respond_with(status_code(200)),
    );

    let identity = StubIdentity::new(false);
    let dispatcher = manual_dispatcher();

    let mut message = get_message(&format!("http://{}/app", server.addr()));
    message.set_identity(Some(identity.clone() as Arc<dyn Identity>));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(identity.reauth_requests(), 1);
    assert_eq!(identity.identity_rewrites(), 2);
}

/// The dispatcher-level identity wins over the message-level one.
#[test]
fn test_dispatcher_identity_overrides_message_identity() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/app"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let dispatcher_identity = StubIdentity::new(true);
    let message_identity = StubIdentity::new(false);

    let dispatcher = manual_dispatcher();
    dispatcher.set_identity(Some(dispatcher_identity.clone() as Arc<dyn Identity>));

    let mut message = get_message(&format!("http://{}/app", server.addr()));
    message.set_identity(Some(message_identity.clone() as Arc<dyn Identity>));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(dispatcher_identity.identity_rewrites(), 1);
    assert_eq!(message_identity.identity_rewrites(), 0);
    assert_eq!(message_identity.reauth_requests(), 0);
}
