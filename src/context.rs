//! Shared engine state.
//!
//! A process typically runs one [`EngineContext`] shared by every
//! dispatcher: it owns the observer registry, the connection
//! configuration, and the global cookie state that dispatchers opt in
//! to. Tests create isolated contexts instead of touching the installed
//! one.
//!
//! Connection settings can change at runtime (a new upstream proxy, a
//! different timeout). Rather than chasing every pooled client, the
//! context bumps a generation counter; transports compare it and rebuild
//! their clients on the next send.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::OnceCell;

use crate::config::ConnectionConfig;
use crate::observer::ObserverRegistry;
use crate::session::SessionState;

static GLOBAL_CONTEXT: OnceCell<Arc<EngineContext>> = OnceCell::new();

/// Process-wide engine state shared by dispatchers.
pub struct EngineContext {
    observers: ObserverRegistry,
    connection: RwLock<ConnectionConfig>,
    global_session: Mutex<Arc<SessionState>>,
    generation: AtomicU64,
}

impl EngineContext {
    /// Creates a context with the given connection configuration.
    pub fn new(config: ConnectionConfig) -> Arc<EngineContext> {
        Arc::new(EngineContext {
            observers: ObserverRegistry::new(),
            connection: RwLock::new(config),
            global_session: Mutex::new(Arc::new(SessionState::new())),
            generation: AtomicU64::new(0),
        })
    }

    /// Creates a context with default connection settings.
    pub fn with_defaults() -> Arc<EngineContext> {
        EngineContext::new(ConnectionConfig::default())
    }

    /// Installs `context` as the process-wide context. Returns `false`
    /// when one was already installed, in which case the existing context
    /// stays in place.
    pub fn init_global(context: Arc<EngineContext>) -> bool {
        GLOBAL_CONTEXT.set(context).is_ok()
    }

    /// The process-wide context, installing a default one on first use.
    pub fn global() -> Arc<EngineContext> {
        GLOBAL_CONTEXT
            .get_or_init(EngineContext::with_defaults)
            .clone()
    }

    /// The shared observer registry.
    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    /// A snapshot of the current connection configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        self.connection.read().unwrap().clone()
    }

    /// Applies a change to the connection configuration and marks every
    /// pooled client stale.
    pub fn update_connection_config(&self, update: impl FnOnce(&mut ConnectionConfig)) {
        {
            let mut config = self.connection.write().unwrap();
            update(&mut config);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Current configuration generation. Transports rebuild their clients
    /// when this no longer matches the generation they were built at.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The global session state shared by dispatchers that use it.
    pub fn global_session(&self) -> Arc<SessionState> {
        self.global_session.lock().unwrap().clone()
    }

    /// Discards the global session state, replacing it with an empty one.
    /// Dispatchers pick up the new state on their next send.
    pub fn reset_global_session(&self) {
        let mut session = self.global_session.lock().unwrap();
        *session = Arc::new(SessionState::new());
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("observers", &self.observers)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
