//! High-level interface for discovering the egress path.
//!
//! ```no_run
//! use egress::easy::{find_egress_path, Config};
//!
//! let path = find_egress_path(Config::default()).unwrap();
//! println!("{} {:?} {:?}", path.gateway, path.gateway_mac, path.src_addr);
//! ```
//!
//! Every call performs a fresh query: nothing is cached between calls.
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

use log::{debug, error, warn};
use pnet::util::MacAddr;

use crate::error::Result;
use crate::interface::{resolve_interface_address_with, InterfaceAddressMethod};
use crate::models::{EgressPath, GatewayInfo, RequestContext};
use crate::neighbors::{
    check_protocol_addr, find_gateway, InterfaceNames, NeighborTable, DEFAULT_ARP_BINARY,
    DEFAULT_PROCFS_ARP,
};
use crate::netlink::{RouteChannel, RouteRequest, Transport};

/// Discovery configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Size in bytes of the buffer receiving the route dump.
    pub receive_buffer_capacity: usize,
    /// Sequence number and port id of route dump requests.
    pub context: RequestContext,
    /// Path to the neighbor table in procfs (Linux).
    pub procfs_arp: String,
    /// Path to the arp binary (BSD, macOS).
    pub arp_binary: String,
    /// Method used to find interface addresses.
    pub interface_address_method: InterfaceAddressMethod,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            receive_buffer_capacity: 8192,
            context: RequestContext::for_current_process(),
            procfs_arp: DEFAULT_PROCFS_ARP.to_string(),
            arp_binary: DEFAULT_ARP_BINARY.to_string(),
            interface_address_method: InterfaceAddressMethod::Auto,
        }
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "receive_buffer_capacity={:?}",
            self.receive_buffer_capacity
        )?;
        write!(f, " sequence={:?}", self.context.sequence)?;
        write!(f, " port_id={:?}", self.context.port_id)?;
        write!(f, " procfs_arp={:?}", self.procfs_arp)?;
        write!(f, " arp_binary={:?}", self.arp_binary)?;
        write!(
            f,
            " interface_address_method={}",
            self.interface_address_method
        )
    }
}

/// Find the default IPv4 gateway and its output interface.
#[cfg(target_os = "linux")]
pub fn find_default_gateway_with_config(config: &Config) -> Result<GatewayInfo> {
    debug!("{}", config);
    let mut channel = RouteChannel::open().map_err(|e| {
        error!("unable to open netlink socket: {}", e);
        e
    })?;
    query_default_gateway(
        &mut channel,
        &crate::neighbors::SystemInterfaceNames,
        config,
    )
}

/// Default gateway lookup requires netlink and is not available on this platform.
#[cfg(not(target_os = "linux"))]
pub fn find_default_gateway_with_config(config: &Config) -> Result<GatewayInfo> {
    debug!("{}", config);
    warn!("default gateway lookup is not yet implemented on this platform");
    Err(crate::error::Error::Unsupported(
        "default gateway lookup is not implemented on this platform",
    ))
}

/// Dump the routing table over `channel` and extract the default gateway.
pub fn query_default_gateway<T: Transport, N: InterfaceNames>(
    channel: &mut RouteChannel<T>,
    names: &N,
    config: &Config,
) -> Result<GatewayInfo> {
    let dump = channel.query(
        &RouteRequest::default(),
        &config.context,
        config.receive_buffer_capacity,
    )?;
    find_gateway(&dump, names).map_err(|e| {
        warn!("unable to find the default gateway: {}", e);
        e
    })
}

/// Resolve the hardware address of `addr` from the neighbor table.
pub fn resolve_hardware_address_with_config(
    addr: Ipv4Addr,
    interface: Option<&str>,
    config: &Config,
) -> Result<MacAddr> {
    check_protocol_addr(addr)?;
    let table = if cfg!(target_os = "linux") {
        NeighborTable::from_procfs(&config.procfs_arp)
    } else {
        NeighborTable::from_arp(&config.arp_binary, addr)
    }
    .map_err(|e| {
        error!("failed to open arp table: {}", e);
        e
    })?;
    table.resolve(addr, interface)
}

/// Return the IPv4 address bound to `interface`.
pub fn resolve_interface_address_with_config(interface: &str, config: &Config) -> Result<Ipv4Addr> {
    resolve_interface_address_with(interface, config.interface_address_method).map_err(|e| {
        error!("unable to find the address of {}: {}", interface, e);
        e
    })
}

/// Find the default gateway, then its MAC address and the source address of its interface.
///
/// Only a failure to find the gateway fails the whole call.
pub fn find_egress_path(config: Config) -> Result<EgressPath> {
    let gateway = find_default_gateway_with_config(&config)?;
    let gateway_mac = resolve_hardware_address_with_config(
        gateway.gateway_addr,
        Some(&gateway.interface),
        &config,
    );
    let src_addr = resolve_interface_address_with_config(&gateway.interface, &config);
    Ok(EgressPath {
        gateway,
        gateway_mac,
        src_addr,
    })
}

/// Find the default IPv4 gateway with the default configuration.
pub fn find_default_gateway() -> Result<GatewayInfo> {
    find_default_gateway_with_config(&Config::default())
}

/// Resolve the hardware address of `addr` with the default configuration.
pub fn resolve_hardware_address(addr: Ipv4Addr) -> Result<MacAddr> {
    resolve_hardware_address_with_config(addr, None, &Config::default())
}

/// Return the IPv4 address of `interface` with the default configuration.
pub fn resolve_interface_address(interface: &str) -> Result<Ipv4Addr> {
    resolve_interface_address_with_config(interface, &Config::default())
}
