//! egress: the outbound request engine of a security-testing proxy suite.
//!
//! Every subsystem that sends traffic (the intercepting proxy, scanners,
//! spider, fuzzer, and so on) does it through a [`RequestDispatcher`].
//! The dispatcher applies the same pipeline to every message: observer
//! notification, identity-based request rewriting with a single automatic
//! re-authentication retry, session cookie selection, execution over
//! pooled blocking connections, and redirect following with caller-supplied
//! validation. The response is written onto the message in place, along
//! with send timing, so the caller and every observer see one consistent
//! record of the exchange.
//!
//! # Example
//!
//! ```no_run
//! use egress::{EngineContext, HttpMessage, Initiator, RequestDispatcher};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = EngineContext::with_defaults();
//! let dispatcher = RequestDispatcher::new(context, Initiator::MANUAL_REQUEST);
//! dispatcher.set_follow_redirects(true);
//!
//! let mut message = HttpMessage::get(Url::parse("http://example.com/")?);
//! dispatcher.send(&mut message)?;
//!
//! if let Some(response) = &message.response {
//!     println!("{} in {:?}", response.status, message.elapsed());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Certificate validation is permissive: the engine exists to talk to
//! arbitrary, frequently misconfigured targets. Only the update-check
//! initiator gets strict validation.

#![warn(missing_docs)]

pub mod config;
mod context;
mod dispatch;
pub mod error_handling;
mod identity;
pub mod initialization;
mod initiator;
mod message;
mod observer;
mod redirect;
mod session;
mod transport;

// Re-export public API
pub use config::{
    ClientCertificate, ConnectionConfig, LogFormat, LogLevel, ProxyConfig, ProxyCredentials,
    RequestConfig, RequestConfigBuilder,
};
pub use context::EngineContext;
pub use dispatch::RequestDispatcher;
pub use error_handling::{InitializationError, SendError, TransportKind};
pub use identity::Identity;
pub use initiator::Initiator;
pub use message::{HttpMessage, RequestData, ResponseData};
pub use observer::{MessageObserver, ObserverRegistry};
pub use redirect::{AcceptAllRedirects, RedirectValidator};
pub use session::SessionState;
pub use transport::UpgradedConnection;
