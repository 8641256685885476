//! Cookie session wiring across real exchanges.
//!
//! The session matrix (global, private, disabled) has unit coverage next
//! to the dispatcher; these tests prove the wire-level consequences: what
//! a server hands out in `Set-Cookie` and what comes back in `Cookie` on
//! the next request.

mod helpers;

use httptest::{matchers::*, responders::*, Expectation, Server};
use reqwest::header::{HeaderValue, COOKIE};

use egress::{ConnectionConfig, EngineContext, Initiator, RequestDispatcher};

use helpers::{get_message, manual_dispatcher};

fn global_session_context() -> std::sync::Arc<EngineContext> {
    EngineContext::new(ConnectionConfig {
        global_session_enabled: true,
        ..ConnectionConfig::default()
    })
}

/// A cookie set on one exchange rides along on the next one through the
/// same dispatcher.
#[test]
fn test_cookie_round_trip_through_global_session() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/login")).respond_with(
            status_code(200).append_header("Set-Cookie", "sid=abc123; Path=/"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/account"),
            request::headers(contains(("cookie", "sid=abc123"))),
        ])
        .respond_with(status_code(200)),
    );

    let dispatcher = RequestDispatcher::new(global_session_context(), Initiator::MANUAL_REQUEST);

    let mut login = get_message(&format!("http://{}/login", server.addr()));
    dispatcher.send(&mut login).expect("login should succeed");

    let mut account = get_message(&format!("http://{}/account", server.addr()));
    dispatcher.send(&mut account).expect("account should succeed");

    // The stored request reflects the header that actually went out.
    assert_eq!(
        account.request.headers.get(COOKIE).map(|v| v.as_bytes()),
        Some(&b"sid=abc123"[..])
    );
}

/// Dispatchers in global mode share one cookie store per context.
#[test]
fn test_global_session_shared_across_dispatchers() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/login")).respond_with(
            status_code(200).append_header("Set-Cookie", "sid=shared; Path=/"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/other"),
            request::headers(contains(("cookie", "sid=shared"))),
        ])
        .respond_with(status_code(200)),
    );

    let context = global_session_context();
    let first = RequestDispatcher::new(context.clone(), Initiator::MANUAL_REQUEST);
    let second = RequestDispatcher::new(context, Initiator::SPIDER);

    let mut login = get_message(&format!("http://{}/login", server.addr()));
    first.send(&mut login).expect("login should succeed");

    let mut other = get_message(&format!("http://{}/other", server.addr()));
    second.send(&mut other).expect("other should succeed");
    assert!(other.request.headers.contains_key(COOKIE));
}

/// Private sessions are per dispatcher: one dispatcher's cookies never
/// appear on another's requests.
#[test]
fn test_private_sessions_do_not_cross_dispatchers() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/login")).respond_with(
            status_code(200).append_header("Set-Cookie", "sid=private; Path=/"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/probe"),
            request::headers(not(contains(key("cookie")))),
        ])
        .respond_with(status_code(200)),
    );

    let context = global_session_context();
    let first = RequestDispatcher::new(context.clone(), Initiator::MANUAL_REQUEST);
    first.set_use_global_state(false);
    let second = RequestDispatcher::new(context, Initiator::MANUAL_REQUEST);
    second.set_use_global_state(false);

    let mut login = get_message(&format!("http://{}/login", server.addr()));
    first.send(&mut login).expect("login should succeed");

    let mut probe = get_message(&format!("http://{}/probe", server.addr()));
    second.send(&mut probe).expect("probe should succeed");
    assert!(probe.request.headers.get(COOKIE).is_none());
}

/// A private session does persist across sends of its own dispatcher.
#[test]
fn test_private_session_persists_within_dispatcher() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/login")).respond_with(
            status_code(200).append_header("Set-Cookie", "sid=mine; Path=/"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/again"),
            request::headers(contains(("cookie", "sid=mine"))),
        ])
        .respond_with(status_code(200)),
    );

    let dispatcher = manual_dispatcher();
    dispatcher.set_use_global_state(false);

    let mut login = get_message(&format!("http://{}/login", server.addr()));
    dispatcher.send(&mut login).expect("login should succeed");

    let mut again = get_message(&format!("http://{}/again", server.addr()));
    dispatcher.send(&mut again).expect("again should succeed");
    assert!(again.request.headers.contains_key(COOKIE));
}

/// With cookies off, `Set-Cookie` answers are dropped on the floor.
#[test]
fn test_cookies_disabled_sends_none() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/login")).respond_with(
            status_code(200).append_header("Set-Cookie", "sid=ignored; Path=/"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/again"),
            request::headers(not(contains(key("cookie")))),
        ])
        .respond_with(status_code(200)),
    );

    let dispatcher = RequestDispatcher::new(global_session_context(), Initiator::MANUAL_REQUEST);
    dispatcher.set_use_cookies(false);

    let mut login = get_message(&format!("http://{}/login", server.addr()));
    dispatcher.send(&mut login).expect("login should succeed");

    let mut again = get_message(&format!("http://{}/again", server.addr()));
    dispatcher.send(&mut again).expect("again should succeed");
    assert!(again.request.headers.get(COOKIE).is_none());
}

/// Global mode falls back to no session at all while the engine-wide
/// switch is off.
#[test]
fn test_global_mode_inert_without_engine_switch() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/login")).respond_with(
            status_code(200).append_header("Set-Cookie", "sid=nope; Path=/"),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/again"),
            request::headers(not(contains(key("cookie")))),
        ])
        .respond_with(status_code(200)),
    );

    // Default config leaves the global session disabled.
    let dispatcher = manual_dispatcher();
    assert!(!dispatcher.is_global_state_enabled());

    let mut login = get_message(&format!("http://{}/login", server.addr()));
    dispatcher.send(&mut login).expect("login should succeed");

    let mut again = get_message(&format!("http://{}/again", server.addr()));
    dispatcher.send(&mut again).expect("again should succeed");
    assert!(again.request.headers.get(COOKIE).is_none());
}

/// A hand-written Cookie header is left alone when the selected session
/// has nothing to contribute.
#[test]
fn test_manual_cookie_header_preserved() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/manual"),
            request::headers(contains(("cookie", "crafted=1"))),
        ])
        .respond_with(status_code(200)),
    );

    let dispatcher = manual_dispatcher();
    dispatcher.set_use_global_state(false);

    let mut message = get_message(&format!("http://{}/manual", server.addr()));
    message
        .request
        .headers
        .insert(COOKIE, HeaderValue::from_static("crafted=1"));
    dispatcher.send(&mut message).expect("send should succeed");

    assert_eq!(
        message.request.headers.get(COOKIE).map(|v| v.as_bytes()),
        Some(&b"crafted=1"[..])
    );
}
