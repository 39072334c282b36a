//! Errors surfaced to callers of the command layer.
//!
//! Frame-level codec errors are absorbed by the inbound loop; everything in
//! [`CallError`] terminates a specific `call()` and is returned to the task
//! that issued it.

use std::{io, sync::Arc};

use thiserror::Error;

use crate::{
    codec::CodecError,
    correlation::{CommandId, CorrelationKey, SessionHandle},
};

/// Outcome of a failed call.
#[derive(Clone, Debug, Error)]
pub enum CallError {
    /// A call with the same correlation key is already pending.
    #[error("a call for {0} is already pending")]
    DuplicateKey(CorrelationKey),

    /// No matching response arrived before the deadline.
    #[error("no response for {0} before the deadline")]
    Timeout(CorrelationKey),

    /// The modem answered with a non-zero result code.
    #[error("modem returned result code {0}")]
    Remote(i32),

    /// The link to the modem failed; every pending call receives this.
    #[error("transport error: {0}")]
    Transport(Arc<io::Error>),

    /// The session the call was scoped to was torn down.
    #[error("{0} was closed while the call was pending")]
    SessionClosed(SessionHandle),

    /// The outbound frame could not be encoded.
    #[error("failed to encode request: {0}")]
    Codec(#[from] CodecError),
}

impl CallError {
    /// Wrap an I/O failure of the transport.
    #[must_use]
    pub fn transport(error: io::Error) -> Self { Self::Transport(Arc::new(error)) }

    /// Short label used for log fields and metric dimensions.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::DuplicateKey(_) => "duplicate_key",
            Self::Timeout(_) => "timeout",
            Self::Remote(_) => "remote_error",
            Self::Transport(_) => "transport_error",
            Self::SessionClosed(_) => "session_closed",
            Self::Codec(_) => "codec_error",
        }
    }

    /// Whether the error means the link is gone for good.
    #[must_use]
    pub fn is_transport(&self) -> bool { matches!(self, Self::Transport(_)) }
}

impl From<io::Error> for CallError {
    fn from(error: io::Error) -> Self { Self::transport(error) }
}

/// Errors raised when registering event handlers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubscribeError {
    /// The identifier pair is not catalogued as an event kind.
    #[error("{0} is not a catalogued event")]
    NotAnEvent(CommandId),
}

/// Canonical result alias for call results.
pub type Result<T> = std::result::Result<T, CallError>;
