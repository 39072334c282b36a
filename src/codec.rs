//! Fixed-layout encoding of ALTCOM command and response frames.
//!
//! Every frame starts with a 16-byte prefix. All integers are big-endian and
//! sit at fixed offsets; nothing depends on host alignment or struct layout.
//!
//! ```text
//!  0        4    5    6        8        10       12                16          20
//!  +--------+----+----+--------+--------+--------+-----------------+-----------+
//!  | magic  |ver |type| main   | sub    | length | session         | result    |
//!  | u32    | u8 | u8 | u16    | u16    | u16    | u32             | i32 (resp)|
//!  +--------+----+----+--------+--------+--------+-----------------+-----------+
//! ```
//!
//! Command frames (application processor → modem) end the header at offset
//! 16. Response frames (modem → application processor) append a signed
//! result code. `length` bytes of feature-owned payload follow the header.
//!
//! The codec is pure: it neither consults the transaction registry nor
//! touches the transport.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    byte_order::{
        read_network_i32,
        read_network_u16,
        read_network_u32,
        write_network_i32,
        write_network_u16,
        write_network_u32,
    },
    catalog::CommandCatalog,
    correlation::{CommandId, CorrelatableFrame, SessionHandle},
};

pub mod error;

pub use error::{CodecError, FramingError};

/// Protocol magic opening every frame.
pub const MAGIC: u32 = 0xFEED_BAC5;
/// Protocol version written and accepted by this codec.
pub const VERSION: u8 = 0x01;
/// Length of the prefix shared by both frame types.
pub const PREFIX_LEN: usize = 16;
/// Length of a command header.
pub const COMMAND_HEADER_LEN: usize = PREFIX_LEN;
/// Length of a response header.
pub const RESPONSE_HEADER_LEN: usize = PREFIX_LEN + 4;
/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;
/// Payload limit applied when none is configured.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 4096;

const OFFSET_MAGIC: usize = 0;
const OFFSET_VERSION: usize = 4;
const OFFSET_TYPE: usize = 5;
const OFFSET_MAIN: usize = 6;
const OFFSET_SUB: usize = 8;
const OFFSET_LENGTH: usize = 10;
const OFFSET_SESSION: usize = 12;
const OFFSET_RESULT: usize = 16;

pub(crate) fn clamp_payload_length(value: usize) -> usize { value.min(MAX_PAYLOAD_LEN) }

/// Direction of a frame, carried in the type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameType {
    /// Request from the application processor.
    Command,
    /// Response or event from the modem.
    Response,
}

impl FrameType {
    const fn to_wire(self) -> u8 {
        match self {
            Self::Command => 0x01,
            Self::Response => 0x02,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, FramingError> {
        match byte {
            0x01 => Ok(Self::Command),
            0x02 => Ok(Self::Response),
            other => Err(FramingError::UnknownFrameType(other)),
        }
    }

    /// Header length for frames of this type.
    #[must_use]
    pub const fn header_len(self) -> usize {
        match self {
            Self::Command => COMMAND_HEADER_LEN,
            Self::Response => RESPONSE_HEADER_LEN,
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Response => "response",
        }
    }
}

/// Header of a command frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandHeader {
    /// Operation requested.
    pub command: CommandId,
    /// Session the request is scoped to.
    pub session: SessionHandle,
}

impl CorrelatableFrame for CommandHeader {
    fn command(&self) -> CommandId { self.command }

    fn session(&self) -> SessionHandle { self.session }
}

/// Header of a response frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Operation answered, mirrored from the command.
    pub command: CommandId,
    /// Session mirrored from the command.
    pub session: SessionHandle,
    /// `0` on success, negative on failure.
    pub result: i32,
}

impl ResponseHeader {
    /// Whether the modem reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool { self.result == 0 }
}

impl CorrelatableFrame for ResponseHeader {
    fn command(&self) -> CommandId { self.command }

    fn session(&self) -> SessionHandle { self.session }
}

/// A decoded command frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandFrame {
    /// Frame header.
    pub header: CommandHeader,
    /// Feature-owned payload.
    pub payload: Bytes,
}

/// A decoded response or event frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Frame header.
    pub header: ResponseHeader,
    /// Feature-owned payload.
    pub payload: Bytes,
}

/// Any frame the codec understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Request towards the modem.
    Command(CommandFrame),
    /// Response or event from the modem.
    Response(ResponseFrame),
}

impl Frame {
    /// Direction of this frame.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::Command(_) => FrameType::Command,
            Self::Response(_) => FrameType::Response,
        }
    }

    /// Identifier pair carried by the frame.
    #[must_use]
    pub fn command(&self) -> CommandId {
        match self {
            Self::Command(frame) => frame.header.command,
            Self::Response(frame) => frame.header.command,
        }
    }
}

/// Fields of the shared prefix, available before the full header arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePrefix {
    /// Direction of the frame.
    pub frame_type: FrameType,
    /// Identifier pair.
    pub command: CommandId,
    /// Session handle.
    pub session: SessionHandle,
    /// Declared payload length.
    pub payload_len: usize,
}

impl FramePrefix {
    /// Header length implied by the frame type.
    #[must_use]
    pub const fn header_len(&self) -> usize { self.frame_type.header_len() }

    /// Total frame length: header plus payload.
    #[must_use]
    pub const fn frame_len(&self) -> usize { self.header_len() + self.payload_len }
}

fn field<const N: usize>(src: &[u8], offset: usize) -> Result<[u8; N], FramingError> {
    src.get(offset..offset + N)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or(FramingError::Truncated {
            have: src.len(),
            need: offset + N,
        })
}

/// Encoder and decoder for ALTCOM frames.
///
/// # Examples
///
/// ```
/// use altcom::catalog::CommandCatalog;
/// use altcom::codec::{CommandHeader, Frame, FrameCodec};
/// use altcom::correlation::SessionHandle;
/// use altcom::feature::entropy;
///
/// let codec = FrameCodec::default();
/// let header = CommandHeader {
///     command: entropy::INIT,
///     session: SessionHandle::new(7),
/// };
/// let bytes = codec.encode_command(&header, &[]).unwrap();
/// let decoded = codec.decode(&bytes, &CommandCatalog::standard()).unwrap();
/// assert!(matches!(decoded, Frame::Command(frame) if frame.header == header));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    max_payload_len: usize,
}

impl FrameCodec {
    /// Construct a codec accepting payloads up to `max_payload_len` bytes.
    ///
    /// The limit is clamped to what the length field can express.
    #[must_use]
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            max_payload_len: clamp_payload_length(max_payload_len),
        }
    }

    /// Largest payload this codec will encode or accept.
    #[must_use]
    pub const fn max_payload_len(&self) -> usize { self.max_payload_len }

    /// Encode a command frame.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::OversizedPayload`] when `payload` exceeds the
    /// configured maximum.
    pub fn encode_command(
        &self,
        header: &CommandHeader,
        payload: &[u8],
    ) -> Result<Bytes, CodecError> {
        let length = self.checked_len(payload)?;
        let mut dst = BytesMut::with_capacity(COMMAND_HEADER_LEN + payload.len());
        put_prefix(
            &mut dst,
            FrameType::Command,
            header.command,
            header.session,
            length,
        );
        dst.put_slice(payload);
        Ok(dst.freeze())
    }

    /// Encode a response frame.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::OversizedPayload`] when `payload` exceeds the
    /// configured maximum.
    pub fn encode_response(
        &self,
        header: &ResponseHeader,
        payload: &[u8],
    ) -> Result<Bytes, CodecError> {
        let length = self.checked_len(payload)?;
        let mut dst = BytesMut::with_capacity(RESPONSE_HEADER_LEN + payload.len());
        put_prefix(
            &mut dst,
            FrameType::Response,
            header.command,
            header.session,
            length,
        );
        dst.put_slice(&write_network_i32(header.result));
        dst.put_slice(payload);
        Ok(dst.freeze())
    }

    /// Encode any frame.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::OversizedPayload`] when the payload exceeds the
    /// configured maximum.
    pub fn encode(&self, frame: &Frame) -> Result<Bytes, CodecError> {
        match frame {
            Frame::Command(f) => self.encode_command(&f.header, &f.payload),
            Frame::Response(f) => self.encode_response(&f.header, &f.payload),
        }
    }

    /// Parse the shared 16-byte prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`FramingError`] when the prefix is truncated, carries the
    /// wrong magic or version, names an unknown frame type, or declares a
    /// payload larger than the configured maximum.
    pub fn decode_prefix(&self, src: &[u8]) -> Result<FramePrefix, FramingError> {
        if src.len() < PREFIX_LEN {
            return Err(FramingError::Truncated {
                have: src.len(),
                need: PREFIX_LEN,
            });
        }
        let magic = read_network_u32(field(src, OFFSET_MAGIC)?);
        if magic != MAGIC {
            return Err(FramingError::BadMagic { found: magic });
        }
        let [version] = field::<1>(src, OFFSET_VERSION)?;
        if version != VERSION {
            return Err(FramingError::UnsupportedVersion(version));
        }
        let [type_byte] = field::<1>(src, OFFSET_TYPE)?;
        let frame_type = FrameType::from_wire(type_byte)?;
        let command = CommandId::new(
            read_network_u16(field(src, OFFSET_MAIN)?),
            read_network_u16(field(src, OFFSET_SUB)?),
        );
        let payload_len = usize::from(read_network_u16(field(src, OFFSET_LENGTH)?));
        if payload_len > self.max_payload_len {
            return Err(FramingError::OversizedPayload {
                size: payload_len,
                max: self.max_payload_len,
            });
        }
        let session = SessionHandle::new(read_network_u32(field(src, OFFSET_SESSION)?));
        Ok(FramePrefix {
            frame_type,
            command,
            session,
            payload_len,
        })
    }

    /// Decode one complete frame occupying all of `src`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] when the buffer is shorter than the
    /// header, the prefix is invalid, or the declared payload length does not
    /// match the bytes present; [`CodecError::UnknownCommand`] when the
    /// identifier pair is not in `catalog`.
    pub fn decode(&self, src: &[u8], catalog: &CommandCatalog) -> Result<Frame, CodecError> {
        let prefix = self.decode_prefix(src)?;
        let header_len = prefix.header_len();
        if src.len() < header_len {
            return Err(FramingError::Truncated {
                have: src.len(),
                need: header_len,
            }
            .into());
        }
        let actual = src.len() - header_len;
        if actual != prefix.payload_len {
            return Err(FramingError::LengthMismatch {
                declared: prefix.payload_len,
                actual,
            }
            .into());
        }
        if !catalog.contains(prefix.command) {
            return Err(CodecError::UnknownCommand(prefix.command));
        }
        let payload = Bytes::copy_from_slice(&src[header_len..]);
        Ok(match prefix.frame_type {
            FrameType::Command => Frame::Command(CommandFrame {
                header: CommandHeader {
                    command: prefix.command,
                    session: prefix.session,
                },
                payload,
            }),
            FrameType::Response => Frame::Response(ResponseFrame {
                header: ResponseHeader {
                    command: prefix.command,
                    session: prefix.session,
                    result: read_network_i32(field(src, OFFSET_RESULT)?),
                },
                payload,
            }),
        })
    }

    fn checked_len(&self, payload: &[u8]) -> Result<u16, CodecError> {
        if payload.len() > self.max_payload_len {
            return Err(FramingError::OversizedPayload {
                size: payload.len(),
                max: self.max_payload_len,
            }
            .into());
        }
        u16::try_from(payload.len()).map_err(|_| {
            CodecError::from(FramingError::OversizedPayload {
                size: payload.len(),
                max: MAX_PAYLOAD_LEN,
            })
        })
    }
}

impl Default for FrameCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_PAYLOAD_LEN) }
}

fn put_prefix(
    dst: &mut BytesMut,
    frame_type: FrameType,
    command: CommandId,
    session: SessionHandle,
    length: u16,
) {
    dst.put_slice(&write_network_u32(MAGIC));
    dst.put_u8(VERSION);
    dst.put_u8(frame_type.to_wire());
    dst.put_slice(&write_network_u16(command.main));
    dst.put_slice(&write_network_u16(command.sub));
    dst.put_slice(&write_network_u16(length));
    dst.put_slice(&write_network_u32(session.as_u32()));
}
