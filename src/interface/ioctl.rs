use std::mem;
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;

use log::debug;
use nix::errno::Errno;
use nix::libc;
use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};

use crate::error::{Error, Result};
use crate::interface::{no_ipv4_address, InterfaceAddressResolver};
use crate::utilities::validate_interface_name;

ioctl_read_bad!(siocgifaddr, libc::SIOCGIFADDR, libc::ifreq);

/// Ask the kernel for the interface address with `SIOCGIFADDR` on a throwaway socket.
#[derive(Copy, Clone, Debug, Default)]
pub struct IoctlResolver;

impl InterfaceAddressResolver for IoctlResolver {
    fn resolve(&self, interface: &str) -> Result<Ipv4Addr> {
        validate_interface_name(interface)?;
        let sock = socket(
            AddressFamily::Inet,
            SockType::Datagram,
            SockFlag::SOCK_CLOEXEC,
            None,
        )
        .map_err(|e| Error::unavailable("datagram socket", e))?;

        // SAFETY: ifreq is plain old data, all zeroes is a valid value.
        let mut ifreq: libc::ifreq = unsafe { mem::zeroed() };
        for (dst, src) in ifreq.ifr_name.iter_mut().zip(interface.bytes()) {
            *dst = src as libc::c_char;
        }
        ifreq.ifr_ifru.ifru_addr = libc::sockaddr {
            sa_family: libc::AF_INET as libc::sa_family_t,
            sa_data: [0; 14],
        };

        // SAFETY: the request reads and writes a single ifreq owned by this frame.
        match unsafe { siocgifaddr(sock.as_raw_fd(), &mut ifreq) } {
            Ok(_) => {}
            Err(Errno::ENODEV | Errno::EADDRNOTAVAIL) => return Err(no_ipv4_address(interface)),
            Err(errno) => return Err(Error::unavailable("interface address", errno)),
        }

        // SAFETY: on success the kernel stored a sockaddr_in, which has the
        // same size as the sockaddr field it was written to.
        let sin: libc::sockaddr_in = unsafe {
            let addr = ifreq.ifr_ifru.ifru_addr;
            std::ptr::read_unaligned(&addr as *const libc::sockaddr as *const libc::sockaddr_in)
        };
        let addr = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
        debug!("ip address found for {}: {}", interface, addr);
        Ok(addr)
    }
}
