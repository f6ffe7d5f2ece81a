use std::net::{Ipv4Addr, SocketAddrV4};

use log::debug;
use nix::ifaddrs::getifaddrs;

use crate::error::{Error, Result};
use crate::interface::{no_ipv4_address, InterfaceAddressResolver};
use crate::models::InterfaceAddress;
use crate::utilities::validate_interface_name;

/// Walk the interface address list and return the first IPv4 address of the interface.
#[derive(Copy, Clone, Debug, Default)]
pub struct IfAddrsResolver;

impl InterfaceAddressResolver for IfAddrsResolver {
    fn resolve(&self, interface: &str) -> Result<Ipv4Addr> {
        validate_interface_name(interface)?;
        let found = interface_addresses()?
            .into_iter()
            .find(|ifaddr| ifaddr.interface == interface)
            .ok_or_else(|| no_ipv4_address(interface))?;
        debug!("ip address found for {}: {}", interface, found.addr);
        Ok(found.addr)
    }
}

/// Return every IPv4 address configured on the host, in the order listed by the OS.
pub fn interface_addresses() -> Result<Vec<InterfaceAddress>> {
    let addresses = getifaddrs().map_err(|e| Error::unavailable("interface list", e))?;
    Ok(addresses
        .filter_map(|ifaddr| {
            let sin = *ifaddr.address.as_ref()?.as_sockaddr_in()?;
            Some(InterfaceAddress {
                interface: ifaddr.interface_name,
                addr: *SocketAddrV4::from(sin).ip(),
            })
        })
        .collect())
}
