//! Helpers for explicit network byte-order conversions.
//!
//! Every multi-byte field of an ALTCOM frame is carried big-endian. These
//! helpers keep Clippy expectations scoped to the conversion points so the
//! codec can stay explicit about wire endianness without repeating lint
//! annotations.

/// Serialise a `u16` in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use altcom::byte_order::write_network_u16;
///
/// assert_eq!(write_network_u16(0x0141), [0x01, 0x41]);
/// ```
#[must_use]
pub fn write_network_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `u16` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use altcom::byte_order::read_network_u16;
///
/// assert_eq!(read_network_u16([0x01, 0x41]), 0x0141);
/// ```
#[must_use]
pub fn read_network_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u16::from_be_bytes(bytes)
}

/// Serialise a `u32` in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use altcom::byte_order::write_network_u32;
///
/// assert_eq!(write_network_u32(0xFEED_BAC5), [0xFE, 0xED, 0xBA, 0xC5]);
/// ```
#[must_use]
pub fn write_network_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use altcom::byte_order::read_network_u32;
///
/// assert_eq!(read_network_u32([0xFE, 0xED, 0xBA, 0xC5]), 0xFEED_BAC5);
/// ```
#[must_use]
pub fn read_network_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u32::from_be_bytes(bytes)
}

/// Serialise an `i32` result code in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use altcom::byte_order::write_network_i32;
///
/// assert_eq!(write_network_i32(-1), [0xFF, 0xFF, 0xFF, 0xFF]);
/// ```
#[must_use]
pub fn write_network_i32(value: i32) -> [u8; 4] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `i32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use altcom::byte_order::read_network_i32;
///
/// assert_eq!(read_network_i32([0xFF, 0xFF, 0xFF, 0xFE]), -2);
/// ```
#[must_use]
pub fn read_network_i32(bytes: [u8; 4]) -> i32 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    i32::from_be_bytes(bytes)
}
