//! Initiator tags for outbound requests.
//!
//! Every dispatcher is created for exactly one initiator, identifying the
//! component on whose behalf it sends. The tag travels to observers (which
//! routinely filter on it) and switches a small number of behaviors inside
//! the engine itself, such as identity rewriting and certificate checking.

/// Identifies the component that originated a request.
///
/// Known initiators carry stable integer ids so that observers can rely on
/// them across versions. Additional components may mint their own tags with
/// [`Initiator::custom`]; any id outside the known set is reported with the
/// name `"custom"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Initiator(i32);

impl Initiator {
    /// The intercepting proxy forwarding a browser's request.
    pub const PROXY: Initiator = Initiator(1);
    /// The active vulnerability scanner.
    pub const ACTIVE_SCANNER: Initiator = Initiator(2);
    /// The conventional crawler.
    pub const SPIDER: Initiator = Initiator(3);
    /// The fuzzer.
    pub const FUZZER: Initiator = Initiator(4);
    /// A login/authentication flow establishing a session.
    pub const AUTHENTICATION: Initiator = Initiator(5);
    /// A request composed and sent manually by the operator.
    pub const MANUAL_REQUEST: Initiator = Initiator(6);
    /// The tool's own update check.
    pub const CHECK_FOR_UPDATES: Initiator = Initiator(7);
    /// The interactive script console.
    pub const SCRIPT_CONSOLE: Initiator = Initiator(8);
    /// The access-control scanner.
    pub const ACCESS_CONTROL_SCANNER: Initiator = Initiator(9);
    /// The browser-driven crawler.
    pub const AJAX_SPIDER: Initiator = Initiator(10);
    /// The forced-browse component.
    pub const FORCED_BROWSE: Initiator = Initiator(11);
    /// The anti-CSRF token generator.
    pub const TOKEN_GENERATOR: Initiator = Initiator(12);
    /// The WebSocket component (handshake requests).
    pub const WEB_SOCKET: Initiator = Initiator(13);
    /// Helper requests made while configuring authentication.
    pub const AUTHENTICATION_HELPER: Initiator = Initiator(14);
    /// Background polling that verifies a session is still authenticated.
    pub const AUTHENTICATION_POLL: Initiator = Initiator(15);
    /// Out-of-band callback interactions.
    pub const OAST: Initiator = Initiator(16);

    /// Creates an initiator tag outside the known set.
    pub const fn custom(id: i32) -> Initiator {
        Initiator(id)
    }

    /// Returns the stable integer id of this initiator.
    pub fn id(&self) -> i32 {
        self.0
    }

    /// Returns a human-readable name for this initiator.
    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "proxy",
            2 => "active-scanner",
            3 => "spider",
            4 => "fuzzer",
            5 => "authentication",
            6 => "manual-request",
            7 => "check-for-updates",
            8 => "script-console",
            9 => "access-control-scanner",
            10 => "ajax-spider",
            11 => "forced-browse",
            12 => "token-generator",
            13 => "web-socket",
            14 => "authentication-helper",
            15 => "authentication-poll",
            16 => "oast",
            _ => "custom",
        }
    }
}

impl std::fmt::Display for Initiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}
