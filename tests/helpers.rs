// Shared test helpers for building isolated dispatchers and messages.
//
// Every test gets its own EngineContext so observer registrations and
// cookie state never leak between tests running in parallel.

use egress::{EngineContext, HttpMessage, Initiator, RequestDispatcher};
use url::Url;

/// Creates a manual-request dispatcher backed by a fresh, isolated context.
#[allow(dead_code)] // Used by other test files
pub fn manual_dispatcher() -> RequestDispatcher {
    RequestDispatcher::new(EngineContext::with_defaults(), Initiator::MANUAL_REQUEST)
}

/// Creates a GET message for the given URL string.
#[allow(dead_code)] // Used by other test files
pub fn get_message(url: &str) -> HttpMessage {
    HttpMessage::get(Url::parse(url).expect("test URL should parse"))
}
