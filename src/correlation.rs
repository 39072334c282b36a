//! Identifiers used to correlate responses with the calls that produced them.
//!
//! A response is matched to its call by the [`CorrelationKey`]: the main and
//! sub command identifiers plus the session handle the call was scoped to.
//! [`CorrelatableFrame`] abstracts over the header types that carry those
//! fields so the registry and inbound loop can inspect them generically.

use std::fmt;

/// Main and sub command identifiers of one modem operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId {
    /// Feature family, for example the entropy service.
    pub main: u16,
    /// Operation within the family, for example `INIT` or `FREE`.
    pub sub: u16,
}

impl CommandId {
    /// Create a command identifier from its main and sub parts.
    #[must_use]
    pub const fn new(main: u16, sub: u16) -> Self { Self { main, sub } }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}/{:#04x}", self.main, self.sub)
    }
}

/// Opaque handle scoping a call to a caller's session or context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u32);

impl SessionHandle {
    /// Handle used by calls that are not scoped to any session.
    pub const GLOBAL: Self = Self(0);

    /// Wrap a raw session handle.
    #[must_use]
    pub const fn new(raw: u32) -> Self { Self(raw) }

    /// Return the raw handle as carried on the wire.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl From<u32> for SessionHandle {
    fn from(value: u32) -> Self { Self(value) }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "session {}", self.0) }
}

/// Tuple matching a response to the pending call that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    /// Command the call issued.
    pub command: CommandId,
    /// Session the call was scoped to.
    pub session: SessionHandle,
}

impl CorrelationKey {
    /// Build a key from a command and session.
    #[must_use]
    pub const fn new(command: CommandId, session: SessionHandle) -> Self {
        Self { command, session }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.command, self.session)
    }
}

/// Access the correlation fields carried by a frame header.
pub trait CorrelatableFrame {
    /// Command identifiers carried by the frame.
    fn command(&self) -> CommandId;

    /// Session handle carried by the frame.
    fn session(&self) -> SessionHandle;

    /// Key used to match this frame against pending calls.
    fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::new(self.command(), self.session())
    }
}
