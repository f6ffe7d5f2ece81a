use log::debug;

use crate::error::{Error, Result};
use crate::netlink::{align, NetlinkHeader, NLMSG_HDRLEN, RTA_HDRLEN};

/// One netlink frame borrowed from a receive buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Message<'a> {
    pub header: NetlinkHeader,
    pub payload: &'a [u8],
}

/// Iterate over the frames of a buffer filled by the kernel.
///
/// Each step checks that a full header is available and that the declared
/// length is neither smaller than the header nor larger than what remains.
/// The first invalid frame yields an error and ends the iteration; frames
/// decoded before it stay usable.
#[derive(Clone, Debug)]
pub struct Messages<'a> {
    buffer: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Messages<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            done: false,
        }
    }

    /// Offset of the next frame in the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn fail(&mut self, message: String) -> Option<Result<Message<'a>>> {
        let start = self.offset.min(self.buffer.len());
        let end = (start + NLMSG_HDRLEN).min(self.buffer.len());
        debug!(
            "invalid netlink frame at offset {}: {} ({})",
            self.offset,
            message,
            hex::encode(&self.buffer[start..end])
        );
        self.done = true;
        Some(Err(Error::Protocol(message)))
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = Result<Message<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buffer.len() {
            return None;
        }
        let remaining = &self.buffer[self.offset..];
        let header = match NetlinkHeader::parse(remaining) {
            Some(header) => header,
            None => {
                return self.fail(format!(
                    "{} trailing bytes are too short for a header",
                    remaining.len()
                ))
            }
        };
        let length = header.length as usize;
        if length < NLMSG_HDRLEN {
            return self.fail(format!("declared length {length} is below the header size"));
        }
        if length > remaining.len() {
            return self.fail(format!(
                "declared length {length} exceeds the {} remaining bytes",
                remaining.len()
            ));
        }
        let payload = &remaining[NLMSG_HDRLEN..length];
        // The last frame of a datagram may omit its padding.
        let advance = align(length).unwrap_or(length).min(remaining.len());
        self.offset += advance;
        Some(Ok(Message { header, payload }))
    }
}

/// A typed attribute (`struct rtattr` and its value).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub kind: u16,
    pub value: &'a [u8],
}

impl Attribute<'_> {
    /// Interpret the value as a host-order `u32`.
    pub fn as_u32(&self) -> Result<u32> {
        let bytes: [u8; 4] = self.value.try_into().map_err(|_| {
            Error::protocol(format!(
                "attribute {} has {} bytes, expected 4",
                self.kind,
                self.value.len()
            ))
        })?;
        Ok(u32::from_ne_bytes(bytes))
    }

    /// Interpret the value as 4 raw bytes (e.g. an IPv4 address in network order).
    pub fn as_octets(&self) -> Result<[u8; 4]> {
        self.value.try_into().map_err(|_| {
            Error::protocol(format!(
                "attribute {} has {} bytes, expected 4",
                self.kind,
                self.value.len()
            ))
        })
    }
}

/// Iterate over length-prefixed, 4-byte aligned attributes.
#[derive(Clone, Debug)]
pub struct Attributes<'a> {
    buffer: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Attributes<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            done: false,
        }
    }

    fn fail(&mut self, message: String) -> Option<Result<Attribute<'a>>> {
        debug!(
            "invalid route attribute at offset {}: {} ({})",
            self.offset,
            message,
            hex::encode(&self.buffer[self.offset.min(self.buffer.len())..])
        );
        self.done = true;
        Some(Err(Error::Protocol(message)))
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Result<Attribute<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buffer.len() {
            return None;
        }
        let remaining = &self.buffer[self.offset..];
        if remaining.len() < RTA_HDRLEN {
            return self.fail(format!(
                "{} trailing bytes are too short for an attribute",
                remaining.len()
            ));
        }
        let length = u16::from_ne_bytes([remaining[0], remaining[1]]) as usize;
        let kind = u16::from_ne_bytes([remaining[2], remaining[3]]);
        if length < RTA_HDRLEN {
            return self.fail(format!("attribute {kind} declares length {length}"));
        }
        if length > remaining.len() {
            return self.fail(format!(
                "attribute {kind} declares length {length} but {} bytes remain",
                remaining.len()
            ));
        }
        let value = &remaining[RTA_HDRLEN..length];
        self.offset += align(length).unwrap_or(length).min(remaining.len());
        Some(Ok(Attribute { kind, value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::{NLMSG_DONE, NLM_F_MULTI, RTM_NEWROUTE};

    fn frame(message_type: u16, flags: u16, payload: &[u8]) -> Vec<u8> {
        let length = NLMSG_HDRLEN + payload.len();
        let mut buffer = vec![0u8; align(length).unwrap()];
        NetlinkHeader {
            length: length as u32,
            message_type,
            flags,
            sequence: 1,
            port_id: 0,
        }
        .emit(&mut buffer);
        buffer[NLMSG_HDRLEN..length].copy_from_slice(payload);
        buffer
    }

    fn attribute(kind: u16, value: &[u8]) -> Vec<u8> {
        let length = RTA_HDRLEN + value.len();
        let mut buffer = vec![0u8; align(length).unwrap()];
        buffer[0..2].copy_from_slice(&(length as u16).to_ne_bytes());
        buffer[2..4].copy_from_slice(&kind.to_ne_bytes());
        buffer[4..length].copy_from_slice(value);
        buffer
    }

    #[test]
    fn test_messages_padding() {
        let mut buffer = frame(RTM_NEWROUTE, NLM_F_MULTI, &[1, 2, 3, 4, 5]);
        buffer.extend(frame(NLMSG_DONE, NLM_F_MULTI, &[0; 4]));
        let messages: Vec<_> = Messages::new(&buffer).collect::<Result<_>>().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payload, &[1, 2, 3, 4, 5]);
        assert_eq!(messages[1].header.message_type, NLMSG_DONE);
    }

    #[test]
    fn test_messages_unpadded_tail() {
        let mut buffer = frame(RTM_NEWROUTE, 0, &[9; 5]);
        buffer.truncate(NLMSG_HDRLEN + 5);
        let messages: Vec<_> = Messages::new(&buffer).collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_ok());
    }

    #[test]
    fn test_messages_truncated() {
        let mut buffer = frame(RTM_NEWROUTE, NLM_F_MULTI, &[0; 12]);
        let mut truncated = frame(RTM_NEWROUTE, NLM_F_MULTI, &[0; 12]);
        truncated.truncate(20);
        buffer.extend(truncated);

        let mut messages = Messages::new(&buffer);
        assert!(messages.next().unwrap().is_ok());
        assert!(matches!(messages.next(), Some(Err(Error::Protocol(_)))));
        assert!(messages.next().is_none());
    }

    #[test]
    fn test_messages_short_header() {
        let buffer = [0u8; 7];
        let mut messages = Messages::new(&buffer);
        assert!(matches!(messages.next(), Some(Err(Error::Protocol(_)))));
        assert!(messages.next().is_none());
    }

    #[test]
    fn test_messages_length_below_header() {
        let mut buffer = frame(RTM_NEWROUTE, 0, &[]);
        buffer[0..4].copy_from_slice(&8u32.to_ne_bytes());
        let mut messages = Messages::new(&buffer);
        assert!(matches!(messages.next(), Some(Err(Error::Protocol(_)))));
    }

    #[test]
    fn test_attributes() {
        let mut buffer = attribute(4, &2u32.to_ne_bytes());
        buffer.extend(attribute(1, &[10, 0]));
        buffer.extend(attribute(5, &[192, 0, 2, 1]));
        let attributes: Vec<_> = Attributes::new(&buffer).collect::<Result<_>>().unwrap();
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].as_u32().unwrap(), 2);
        assert_eq!(attributes[1].value, &[10, 0]);
        assert!(attributes[1].as_octets().is_err());
        assert_eq!(attributes[2].as_octets().unwrap(), [192, 0, 2, 1]);
    }

    #[test]
    fn test_attributes_overrun() {
        let mut buffer = attribute(5, &[192, 0, 2, 1]);
        buffer[0..2].copy_from_slice(&64u16.to_ne_bytes());
        let mut attributes = Attributes::new(&buffer);
        assert!(matches!(attributes.next(), Some(Err(Error::Protocol(_)))));
        assert!(attributes.next().is_none());
    }
}
