//! Message observation.
//!
//! This module provides:
//! - The `MessageObserver` trait implemented by components that watch
//!   traffic (history, passive scan rules, anti-CSRF handling)
//! - `ObserverRegistry`, the shared, ordered collection of observers
//!
//! Notification order is priority-ascending and stable, so components
//! that must see messages early (for example a token refresher rewriting
//! requests) register with a lower priority than pure consumers. An
//! observer that itself sends messages would recurse into notification;
//! the registry tracks which threads are mid-notification and skips the
//! nested round while still letting the nested message go out on the
//! wire.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::dispatch::RequestDispatcher;
use crate::initiator::Initiator;
use crate::message::HttpMessage;

/// Watches messages as they are sent and received.
///
/// Observers may mutate the message: request hooks run before transport,
/// response hooks after the response is in place. `sender` is the
/// dispatcher performing the exchange, so an observer can issue follow-up
/// requests through it; those nested sends skip notification on the
/// current thread. Implementations are called from whichever thread
/// performs the send and must be `Send + Sync`.
pub trait MessageObserver: Send + Sync {
    /// Notification order. Lower values are notified first; observers
    /// with equal priority keep their registration order. Sampled once
    /// when the observer is registered.
    fn priority(&self) -> i32 {
        0
    }

    /// Called before a message goes to the transport.
    fn on_request_send(
        &self,
        message: &mut HttpMessage,
        initiator: Initiator,
        sender: &RequestDispatcher,
    );

    /// Called after an exchange completes, successfully or not. The
    /// message carries whatever response was received, if any.
    fn on_response_received(
        &self,
        message: &mut HttpMessage,
        initiator: Initiator,
        sender: &RequestDispatcher,
    );
}

/// Ordered, shared collection of message observers.
///
/// A failing observer never affects the send or the remaining observers:
/// panics are caught per observer and logged.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<(i32, Arc<dyn MessageObserver>)>>,
    notifying_threads: Mutex<HashSet<ThreadId>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ObserverRegistry::default()
    }

    /// Registers an observer, keeping the collection sorted by priority.
    pub fn add(&self, observer: Arc<dyn MessageObserver>) {
        // priority() is caller code and may panic; it runs before the
        // lock is taken.
        let priority = observer.priority();
        let mut observers = self.observers.lock().unwrap();
        observers.push((priority, observer));
        observers.sort_by_key(|(priority, _)| *priority);
    }

    /// Removes a previously registered observer. Identity is by
    /// allocation, so the same `Arc` (or a clone of it) must be passed.
    pub fn remove(&self, observer: &Arc<dyn MessageObserver>) {
        let mut observers = self.observers.lock().unwrap();
        observers.retain(|(_, registered)| !Arc::ptr_eq(registered, observer));
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifies all observers of a message about to be sent.
    pub fn notify_request_sent(
        &self,
        message: &mut HttpMessage,
        initiator: Initiator,
        sender: &RequestDispatcher,
    ) {
        self.notify_each(|observer| observer.on_request_send(message, initiator, sender));
    }

    /// Notifies all observers of a completed exchange.
    pub fn notify_response_received(
        &self,
        message: &mut HttpMessage,
        initiator: Initiator,
        sender: &RequestDispatcher,
    ) {
        self.notify_each(|observer| observer.on_response_received(message, initiator, sender));
    }

    fn notify_each(&self, mut call: impl FnMut(&dyn MessageObserver)) {
        let thread = thread::current().id();
        {
            let mut notifying = self.notifying_threads.lock().unwrap();
            // A nested send from inside an observer skips notification;
            // the message itself is still sent.
            if !notifying.insert(thread) {
                return;
            }
        }

        let snapshot: Vec<Arc<dyn MessageObserver>> = self
            .observers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| call(observer.as_ref())));
            if let Err(panic) = outcome {
                log::error!("Message observer panicked: {}", panic_message(&panic));
            }
        }

        self.notifying_threads.lock().unwrap().remove(&thread);
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
