use std::io;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::models::RequestContext;
use crate::netlink::{
    encode_request, Emitable, Messages, NLMSG_DONE, NLMSG_ERROR, NLMSG_NOOP, NLMSG_OVERRUN,
    RTM_GETROUTE,
};

/// A datagram transport to the kernel.
pub trait Transport {
    /// Send a single datagram, returning the number of bytes written.
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize>;
    /// Receive a single datagram, returning the number of bytes read.
    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<usize>;
}

/// A `NETLINK_ROUTE` socket. The descriptor is closed on drop.
#[cfg(target_os = "linux")]
pub struct NetlinkSocket {
    fd: std::os::fd::OwnedFd,
}

#[cfg(target_os = "linux")]
impl NetlinkSocket {
    pub fn open(protocol: nix::sys::socket::SockProtocol) -> Result<Self> {
        use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};
        let fd = socket(
            AddressFamily::Netlink,
            SockType::Datagram,
            SockFlag::SOCK_CLOEXEC,
            protocol,
        )
        .map_err(|errno| Error::unavailable("netlink socket", errno))?;
        debug!("opened netlink socket");
        Ok(Self { fd })
    }
}

#[cfg(target_os = "linux")]
impl Transport for NetlinkSocket {
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        use nix::sys::socket::{send, MsgFlags};
        use std::os::fd::AsRawFd;
        Ok(send(self.fd.as_raw_fd(), datagram, MsgFlags::empty())?)
    }

    fn recv(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        use nix::sys::socket::{recv, MsgFlags};
        use std::os::fd::AsRawFd;
        Ok(recv(self.fd.as_raw_fd(), buffer, MsgFlags::empty())?)
    }
}

/// Sends a route dump request and collects the reply frames.
pub struct RouteChannel<T: Transport> {
    transport: T,
}

#[cfg(target_os = "linux")]
impl RouteChannel<NetlinkSocket> {
    /// Open a channel on a fresh `NETLINK_ROUTE` socket.
    pub fn open() -> Result<Self> {
        let socket = NetlinkSocket::open(nix::sys::socket::SockProtocol::NetlinkRoute)?;
        Ok(Self::new(socket))
    }
}

impl<T: Transport> RouteChannel<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send an `RTM_GETROUTE` dump request carrying `payload`.
    ///
    /// Payloads too large to be framed are rejected before anything is written.
    pub fn send<P: Emitable>(&mut self, payload: &P, context: &RequestContext) -> Result<()> {
        let frame = encode_request(RTM_GETROUTE, payload, context.sequence, context.port_id)?;
        let written = self
            .transport
            .send(&frame)
            .map_err(|error| Error::unavailable("netlink socket", error))?;
        if written != frame.len() {
            return Err(Error::unavailable(
                "netlink socket",
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {written} of {} bytes", frame.len()),
                ),
            ));
        }
        debug!(
            "sent RTM_GETROUTE seq={} port_id={} ({} bytes)",
            context.sequence,
            context.port_id,
            frame.len()
        );
        Ok(())
    }

    /// Read reply datagrams into `buffer` until the dump is complete.
    ///
    /// Returns the number of bytes holding route frames; the terminal `DONE`
    /// frame is not included. A reply that does not fit in `buffer` is an
    /// [`Error::Overflow`], a malformed or error frame an [`Error::Protocol`].
    pub fn receive(&mut self, buffer: &mut [u8], context: &RequestContext) -> Result<usize> {
        let mut filled = 0;
        loop {
            let space = &mut buffer[filled..];
            if space.is_empty() {
                return Err(Error::Overflow(format!(
                    "receive buffer of {filled} bytes exhausted before the end of the dump"
                )));
            }
            let capacity = space.len();
            let read = self
                .transport
                .recv(space)
                .map_err(|error| Error::unavailable("netlink socket", error))?;
            if read == 0 {
                return Err(Error::protocol("netlink socket returned no data"));
            }
            if read >= capacity {
                // Datagrams are silently truncated to the space left.
                return Err(Error::Overflow(format!(
                    "reply does not fit in the {} bytes receive buffer",
                    buffer.len()
                )));
            }

            let chunk = &buffer[filled..filled + read];
            let mut end = filled + read;
            let mut finished = false;
            let mut messages = Messages::new(chunk);
            loop {
                let start = messages.offset();
                let message = match messages.next() {
                    Some(message) => message?,
                    None => break,
                };
                if message.header.sequence != context.sequence {
                    return Err(Error::protocol(format!(
                        "unexpected sequence number {} (expected {})",
                        message.header.sequence, context.sequence
                    )));
                }
                match message.header.message_type {
                    NLMSG_ERROR => return Err(error_frame(message.payload)),
                    NLMSG_OVERRUN => return Err(Error::protocol("kernel reported a data overrun")),
                    NLMSG_DONE => {
                        end = filled + start;
                        finished = true;
                        break;
                    }
                    NLMSG_NOOP => {}
                    _ if !message.header.is_multipart() => finished = true,
                    _ => {}
                }
            }
            filled = end;
            if finished {
                debug!("received {} bytes of route frames", filled);
                return Ok(filled);
            }
        }
    }

    /// Send a dump request and return the collected reply frames.
    pub fn query<P: Emitable>(
        &mut self,
        payload: &P,
        context: &RequestContext,
        capacity: usize,
    ) -> Result<Vec<u8>> {
        self.send(payload, context)?;
        let mut buffer = vec![0u8; capacity];
        let length = self.receive(&mut buffer, context)?;
        buffer.truncate(length);
        Ok(buffer)
    }
}

fn error_frame(payload: &[u8]) -> Error {
    match payload.get(..4).and_then(|bytes| bytes.try_into().ok()) {
        Some(bytes) => {
            let code = i32::from_ne_bytes(bytes);
            let error = io::Error::from_raw_os_error(code.saturating_neg());
            warn!("kernel answered the route dump with an error: {}", error);
            Error::protocol(format!("kernel returned error {code}: {error}"))
        }
        None => Error::protocol("truncated error frame"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::netlink::{
        align, NetlinkHeader, RouteRequest, NLMSG_HDRLEN, NLM_F_MULTI, RTM_NEWROUTE,
    };

    #[derive(Default)]
    struct ScriptedTransport {
        sent: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
        reads: usize,
        write_limit: Option<usize>,
    }

    impl Transport for ScriptedTransport {
        fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
            self.sent.push(datagram.to_vec());
            Ok(self.write_limit.unwrap_or(datagram.len()).min(datagram.len()))
        }

        fn recv(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            let reply = self
                .replies
                .pop_front()
                .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
            let n = reply.len().min(buffer.len());
            buffer[..n].copy_from_slice(&reply[..n]);
            Ok(n)
        }
    }

    fn frame(message_type: u16, flags: u16, sequence: u32, payload: &[u8]) -> Vec<u8> {
        let length = NLMSG_HDRLEN + payload.len();
        let mut buffer = vec![0u8; align(length).unwrap()];
        NetlinkHeader {
            length: length as u32,
            message_type,
            flags,
            sequence,
            port_id: 0,
        }
        .emit(&mut buffer);
        buffer[NLMSG_HDRLEN..length].copy_from_slice(payload);
        buffer
    }

    fn context() -> RequestContext {
        RequestContext::new(42, 1000)
    }

    #[test]
    fn test_multipart_stream() {
        let mut transport = ScriptedTransport::default();
        for i in 0..3u8 {
            transport
                .replies
                .push_back(frame(RTM_NEWROUTE, NLM_F_MULTI, 42, &[i; 12]));
        }
        transport
            .replies
            .push_back(frame(NLMSG_DONE, NLM_F_MULTI, 42, &[0; 4]));

        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 8192];
        let length = channel.receive(&mut buffer, &context()).unwrap();
        assert_eq!(length, 3 * 28);

        let payloads: Vec<_> = Messages::new(&buffer[..length])
            .map(|m| m.unwrap().payload.to_vec())
            .collect();
        assert_eq!(payloads, vec![vec![0; 12], vec![1; 12], vec![2; 12]]);

        let transport = channel.into_inner();
        assert_eq!(transport.reads, 4);
        assert!(transport.replies.is_empty());
    }

    #[test]
    fn test_done_in_same_datagram() {
        let mut datagram = frame(RTM_NEWROUTE, NLM_F_MULTI, 42, &[7; 12]);
        datagram.extend(frame(RTM_NEWROUTE, NLM_F_MULTI, 42, &[8; 12]));
        datagram.extend(frame(NLMSG_DONE, NLM_F_MULTI, 42, &[0; 4]));
        let mut transport = ScriptedTransport::default();
        transport.replies.push_back(datagram);

        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 1024];
        assert_eq!(channel.receive(&mut buffer, &context()).unwrap(), 56);
    }

    #[test]
    fn test_single_message_reply() {
        let mut transport = ScriptedTransport::default();
        transport.replies.push_back(frame(RTM_NEWROUTE, 0, 42, &[1; 12]));
        transport.replies.push_back(frame(RTM_NEWROUTE, 0, 42, &[2; 12]));

        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 1024];
        assert_eq!(channel.receive(&mut buffer, &context()).unwrap(), 28);
        assert_eq!(channel.into_inner().replies.len(), 1);
    }

    #[test]
    fn test_error_frame() {
        let mut transport = ScriptedTransport::default();
        transport
            .replies
            .push_back(frame(RTM_NEWROUTE, NLM_F_MULTI, 42, &[1; 12]));
        transport
            .replies
            .push_back(frame(NLMSG_ERROR, 0, 42, &(-1i32).to_ne_bytes()));

        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 1024];
        let result = channel.receive(&mut buffer, &context());
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_overrun_frame() {
        let mut transport = ScriptedTransport::default();
        transport
            .replies
            .push_back(frame(RTM_NEWROUTE, NLM_F_MULTI, 42, &[1; 12]));
        transport
            .replies
            .push_back(frame(NLMSG_OVERRUN, NLM_F_MULTI, 42, &[]));
        transport
            .replies
            .push_back(frame(NLMSG_DONE, NLM_F_MULTI, 42, &[0; 4]));

        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 1024];
        let result = channel.receive(&mut buffer, &context());
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(channel.into_inner().replies.len(), 1);
    }

    #[test]
    fn test_empty_read() {
        let mut transport = ScriptedTransport::default();
        transport.replies.push_back(Vec::new());
        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 1024];
        let result = channel.receive(&mut buffer, &context());
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_buffer_exhausted() {
        let mut transport = ScriptedTransport::default();
        for _ in 0..4 {
            transport
                .replies
                .push_back(frame(RTM_NEWROUTE, NLM_F_MULTI, 42, &[1; 12]));
        }
        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 64];
        let result = channel.receive(&mut buffer, &context());
        assert!(matches!(result, Err(Error::Overflow(_))));
    }

    #[test]
    fn test_sequence_mismatch() {
        let mut transport = ScriptedTransport::default();
        transport.replies.push_back(frame(RTM_NEWROUTE, 0, 41, &[1; 12]));
        let mut channel = RouteChannel::new(transport);
        let mut buffer = [0u8; 1024];
        let result = channel.receive(&mut buffer, &context());
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_send_request() {
        let mut channel = RouteChannel::new(ScriptedTransport::default());
        channel.send(&RouteRequest::default(), &context()).unwrap();
        let sent = channel.into_inner().sent;
        assert_eq!(sent.len(), 1);
        let header = NetlinkHeader::parse(&sent[0]).unwrap();
        assert_eq!(header.message_type, RTM_GETROUTE);
        assert_eq!(header.sequence, 42);
        assert_eq!(header.port_id, 1000);
        assert_eq!(sent[0].len(), 28);
    }

    #[test]
    fn test_short_write() {
        let transport = ScriptedTransport {
            write_limit: Some(16),
            ..Default::default()
        };
        let mut channel = RouteChannel::new(transport);
        let result = channel.send(&RouteRequest::default(), &context());
        match result {
            Err(Error::Unavailable { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::WriteZero)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_send_rejects_oversized_payload() {
        struct Oversized;

        impl Emitable for Oversized {
            fn buffer_len(&self) -> usize {
                usize::MAX - 8
            }

            fn emit(&self, _buffer: &mut [u8]) {
                unreachable!()
            }
        }

        let mut channel = RouteChannel::new(ScriptedTransport::default());
        let result = channel.send(&Oversized, &context());
        assert!(matches!(result, Err(Error::Overflow(_))));
        assert!(channel.into_inner().sent.is_empty());
    }
}
