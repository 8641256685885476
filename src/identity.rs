//! Identity abstraction for authenticated sending.
//!
//! The engine never performs authentication itself. It delegates to an
//! [`Identity`] implementation at fixed points of the send algorithm:
//! request rewriting before transport, authentication checking after, and
//! re-authentication when a response shows the session was lost. This
//! keeps scheme-specific logic (form logins, header tokens, script-driven
//! flows) out of the engine while the engine keeps control of when each
//! hook runs.

use std::sync::Arc;

use crate::message::HttpMessage;
use crate::session::SessionState;

/// An authenticated principal on whose behalf messages can be sent.
///
/// Implementations are shared across threads and must be internally
/// synchronized; the engine calls them from whichever thread is sending.
pub trait Identity: Send + Sync {
    /// Whether the given exchanged message shows an authenticated session.
    ///
    /// Called with the response already in place. A `false` return from a
    /// recoverable send triggers one re-authentication and resend.
    fn is_authenticated(&self, message: &HttpMessage) -> bool;

    /// Requests re-authentication before the message is sent again.
    ///
    /// Implementations may authenticate synchronously or mark the session
    /// so the next rewrite picks up fresh credentials.
    fn queue_reauthentication(&self, message: &HttpMessage);

    /// Rewrites the request so it is sent as this identity. The full
    /// rewrite: credentials, tokens, and session material as needed.
    fn process_message_to_match_identity(&self, message: &mut HttpMessage);

    /// Rewrites the request to match this identity's current authenticated
    /// session without forcing authentication. Used by session polling,
    /// which must observe the session rather than repair it.
    fn process_message_to_match_session(&self, message: &mut HttpMessage);

    /// The session state messages sent as this identity should use in
    /// place of the dispatcher's own. `None` means no dedicated state.
    fn session_state(&self) -> Option<Arc<SessionState>> {
        None
    }
}
