//! Typed wrappers around the modem features carried by the command layer.
//!
//! Each feature owns one main command identifier, declares its call and
//! event sub identifiers through
//! [`FeatureFamily`](crate::catalog::FeatureFamily), and encodes its
//! payload records with [`Payload`]. Records are packed: big-endian fixed-width
//! integers, fixed-size byte arrays for strings, no padding.

use bincode::{
    Decode,
    Encode,
    config::{self, BigEndian, Configuration, Fixint},
    decode_from_slice,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};
use thiserror::Error;

use crate::{
    catalog::CatalogBuilder,
    error::CallError,
};

pub mod entropy;
pub mod pdn;
pub mod quality;
pub mod socket;

type WireConfig = Configuration<BigEndian, Fixint>;

const WIRE_CONFIG: WireConfig = config::standard()
    .with_big_endian()
    .with_fixed_int_encoding();

/// Errors returned by the feature APIs.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// The call itself failed.
    #[error(transparent)]
    Call(#[from] CallError),
    /// A request record could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] EncodeError),
    /// A response record could not be decoded.
    #[error("failed to decode payload: {0}")]
    Decode(#[from] DecodeError),
    /// A response carried bytes past the end of its record.
    #[error("payload has {trailing} unexpected trailing bytes")]
    TrailingBytes {
        /// Number of bytes left over.
        trailing: usize,
    },
    /// A string does not fit its fixed-size field.
    #[error("{field} is {len} bytes; at most {max} fit")]
    FieldTooLong {
        /// Field name.
        field: &'static str,
        /// Length of the supplied value.
        len: usize,
        /// Largest length the field holds.
        max: usize,
    },
    /// A response field held a value outside its domain.
    #[error("unexpected value {value} for {field}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Raw value received.
        value: u32,
    },
}

impl FeatureError {
    /// Result code reported by the modem, if the failure came from it.
    #[must_use]
    pub fn remote_code(&self) -> Option<i32> {
        match self {
            Self::Call(CallError::Remote(code)) => Some(*code),
            _ => None,
        }
    }
}

/// Fixed-layout payload record.
///
/// Any type deriving [`Encode`] and [`Decode`] implements this trait through
/// the blanket implementation.
pub trait Payload: Encode + Decode<()> {
    /// Serialize the record.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Encode`] if serialization fails.
    fn to_payload(&self) -> Result<Vec<u8>, FeatureError> { Ok(encode_to_vec(self, WIRE_CONFIG)?) }

    /// Deserialize a record that must span all of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Decode`] when `bytes` is too short or holds an
    /// invalid value, and [`FeatureError::TrailingBytes`] when it is too long.
    fn from_payload(bytes: &[u8]) -> Result<Self, FeatureError>
    where
        Self: Sized,
    {
        let (value, read) = decode_from_slice(bytes, WIRE_CONFIG)?;
        if read != bytes.len() {
            return Err(FeatureError::TrailingBytes {
                trailing: bytes.len() - read,
            });
        }
        Ok(value)
    }
}

impl<T> Payload for T where T: Encode + Decode<()> {}

/// Register every built-in feature family.
#[must_use]
pub fn register_all(builder: CatalogBuilder) -> CatalogBuilder {
    builder
        .family::<entropy::Entropy>()
        .family::<pdn::Pdn>()
        .family::<quality::SignalQuality>()
        .family::<socket::Sockets>()
}

/// Copy `value` into a NUL-terminated fixed-size field.
pub(crate) fn fixed_str<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], FeatureError> {
    let bytes = value.as_bytes();
    let max = N.saturating_sub(1);
    if bytes.len() > max {
        return Err(FeatureError::FieldTooLong {
            field,
            len: bytes.len(),
            max,
        });
    }
    let mut out = [0; N];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Read a NUL-terminated fixed-size field.
pub(crate) fn read_fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
