//! Minimal rtnetlink wire format for dumping the kernel routing table.
//!
//! The constants are defined here rather than taken from `libc` so that the
//! decoding code (and its tests) builds on every platform; only
//! [`NetlinkSocket`] is Linux specific.
//!
//! All multi-byte fields are in host byte order, except for IP addresses carried
//! in attributes which are in network byte order.
mod channel;
mod cursor;

pub use channel::*;
pub use cursor::*;

use crate::error::{Error, Result};

/// Size of `struct nlmsghdr`.
pub const NLMSG_HDRLEN: usize = 16;
/// Size of `struct rtattr`.
pub const RTA_HDRLEN: usize = 4;
/// Size of `struct rtmsg`.
pub const RTMSG_LEN: usize = 12;

pub const NLMSG_NOOP: u16 = 1;
pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;
pub const NLMSG_OVERRUN: u16 = 4;

pub const RTM_NEWROUTE: u16 = 24;
pub const RTM_GETROUTE: u16 = 26;

pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

pub const AF_UNSPEC: u8 = 0;
pub const AF_INET: u8 = 2;

pub const RT_TABLE_UNSPEC: u8 = 0;
pub const RT_TABLE_COMPAT: u8 = 252;
pub const RT_TABLE_MAIN: u8 = 254;

pub const RTA_DST: u16 = 1;
pub const RTA_OIF: u16 = 4;
pub const RTA_GATEWAY: u16 = 5;
pub const RTA_PRIORITY: u16 = 6;
pub const RTA_TABLE: u16 = 15;

/// Round `len` up to the 4-byte netlink alignment, `None` on overflow.
pub fn align(len: usize) -> Option<usize> {
    Some(len.checked_add(3)? & !3)
}

/// Length of a frame carrying `payload_len` bytes, as stored in `nlmsg_len`.
///
/// The padded frame must fit in the 32-bit length field; anything larger is
/// rejected instead of being allowed to wrap around.
pub fn frame_length(payload_len: usize) -> Result<u32> {
    let overflow = || Error::Overflow(format!("{payload_len} bytes payload cannot be framed"));
    let padded = payload_len
        .checked_add(NLMSG_HDRLEN)
        .and_then(align)
        .ok_or_else(overflow)?;
    u32::try_from(padded).map_err(|_| overflow())?;
    u32::try_from(NLMSG_HDRLEN + payload_len).map_err(|_| overflow())
}

/// The fixed netlink message header (`struct nlmsghdr`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetlinkHeader {
    pub length: u32,
    pub message_type: u16,
    pub flags: u16,
    pub sequence: u32,
    pub port_id: u32,
}

impl NetlinkHeader {
    /// Decode a header from the start of `bytes`, `None` if less than 16 bytes remain.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..NLMSG_HDRLEN)?;
        Some(Self {
            length: u32::from_ne_bytes(bytes[0..4].try_into().ok()?),
            message_type: u16::from_ne_bytes(bytes[4..6].try_into().ok()?),
            flags: u16::from_ne_bytes(bytes[6..8].try_into().ok()?),
            sequence: u32::from_ne_bytes(bytes[8..12].try_into().ok()?),
            port_id: u32::from_ne_bytes(bytes[12..16].try_into().ok()?),
        })
    }

    pub fn emit(&self, buffer: &mut [u8]) {
        buffer[0..4].copy_from_slice(&self.length.to_ne_bytes());
        buffer[4..6].copy_from_slice(&self.message_type.to_ne_bytes());
        buffer[6..8].copy_from_slice(&self.flags.to_ne_bytes());
        buffer[8..12].copy_from_slice(&self.sequence.to_ne_bytes());
        buffer[12..16].copy_from_slice(&self.port_id.to_ne_bytes());
    }

    pub fn is_multipart(&self) -> bool {
        self.flags & NLM_F_MULTI != 0
    }
}

/// A request payload that can be serialized after a netlink header.
pub trait Emitable {
    /// Number of bytes written by [`Emitable::emit`].
    fn buffer_len(&self) -> usize;
    /// Serialize into `buffer`, which is exactly `buffer_len()` bytes long.
    fn emit(&self, buffer: &mut [u8]);
}

/// A `struct rtmsg` used as the `RTM_GETROUTE` request body.
///
/// The default value is all zeroes, which asks the kernel for every route of
/// every family and table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteRequest {
    pub family: u8,
    pub table: u8,
}

impl Emitable for RouteRequest {
    fn buffer_len(&self) -> usize {
        RTMSG_LEN
    }

    fn emit(&self, buffer: &mut [u8]) {
        buffer.fill(0);
        buffer[0] = self.family;
        buffer[4] = self.table;
    }
}

/// Serialize a complete request frame with the `REQUEST | DUMP` flags.
pub fn encode_request<T: Emitable>(
    message_type: u16,
    payload: &T,
    sequence: u32,
    port_id: u32,
) -> Result<Vec<u8>> {
    let payload_len = payload.buffer_len();
    let length = frame_length(payload_len)?;
    let mut buffer = vec![0u8; align(length as usize).unwrap_or(length as usize)];
    NetlinkHeader {
        length,
        message_type,
        flags: NLM_F_REQUEST | NLM_F_DUMP,
        sequence,
        port_id,
    }
    .emit(&mut buffer);
    payload.emit(&mut buffer[NLMSG_HDRLEN..NLMSG_HDRLEN + payload_len]);
    Ok(buffer)
}
