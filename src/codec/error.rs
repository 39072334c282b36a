//! Error types for the codec layer.
//!
//! Codec errors describe a single frame. They never escape the inbound frame
//! loop: the offending bytes are discarded, the event is logged and counted,
//! and the loop returns to its idle state.
//!
//! # Error Categories
//!
//! - [`FramingError`]: the bytes do not form a well-shaped frame (short buffer, wrong magic or
//!   version, unknown frame type, oversized or inconsistent payload length).
//! - [`CodecError::UnknownCommand`]: the frame is well shaped but its identifier pair is not in
//!   the catalogue.
//! - [`CodecError::FrameTimeout`]: a partial frame was not completed within the per-frame read
//!   timeout.

use thiserror::Error;

use crate::correlation::CommandId;

/// Wire-level problems with the structure of a frame.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer bytes are available than the header or payload requires.
    #[error("truncated frame: have {have} bytes, need {need}")]
    Truncated {
        /// Bytes available.
        have: usize,
        /// Bytes required.
        need: usize,
    },

    /// The frame does not start with the protocol magic.
    #[error("bad frame magic {found:#010x}")]
    BadMagic {
        /// Value read where the magic was expected.
        found: u32,
    },

    /// Bytes preceding the next frame magic were skipped.
    #[error("skipped {skipped} bytes of noise before frame magic")]
    Noise {
        /// Number of bytes discarded.
        skipped: usize,
    },

    /// The frame carries a protocol version this side does not speak.
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),

    /// The frame type byte is neither command nor response.
    #[error("unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    /// A frame of the wrong direction arrived, for example a command frame
    /// read from the modem.
    #[error("unexpected {0} frame")]
    UnexpectedFrameType(&'static str),

    /// Declared payload length exceeds the configured maximum.
    #[error("payload exceeds max length: {size} > {max}")]
    OversizedPayload {
        /// Declared or actual payload size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// Declared payload length disagrees with the bytes that follow the
    /// header.
    #[error("declared payload length {declared} but {actual} bytes follow the header")]
    LengthMismatch {
        /// Length carried in the header.
        declared: usize,
        /// Bytes actually present after the header.
        actual: usize,
    },
}

/// Top-level codec error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes do not form a valid frame.
    #[error("malformed frame: {0}")]
    Malformed(#[from] FramingError),

    /// The identifier pair is not catalogued.
    #[error("unknown command {0}")]
    UnknownCommand(CommandId),

    /// A partial frame was abandoned after the per-frame read timeout.
    #[error("frame read timed out with {buffered} bytes buffered")]
    FrameTimeout {
        /// Bytes of the partial frame that were discarded.
        buffered: usize,
    },
}

impl CodecError {
    /// Short label used for log fields and metric dimensions.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownCommand(_) => "unknown_command",
            Self::FrameTimeout { .. } => "frame_timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CodecError::Malformed(FramingError::BadMagic { found: 0 }), "malformed")]
    #[case(CodecError::UnknownCommand(CommandId::new(1, 2)), "unknown_command")]
    #[case(CodecError::FrameTimeout { buffered: 3 }, "frame_timeout")]
    fn reason_labels_are_stable(#[case] error: CodecError, #[case] expected: &str) {
        assert_eq!(error.reason(), expected);
    }

    #[test]
    fn framing_error_messages_include_context() {
        let err = CodecError::from(FramingError::OversizedPayload { size: 10, max: 4 });
        assert_eq!(err.to_string(), "malformed frame: payload exceeds max length: 10 > 4");
    }
}
