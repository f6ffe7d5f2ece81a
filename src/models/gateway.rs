use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

use pnet::util::MacAddr;
use serde::Serialize;

use crate::error::Result;

/// The default IPv4 gateway and the interface used to reach it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GatewayInfo {
    pub gateway_addr: Ipv4Addr,
    pub interface: String,
}

impl Display for GatewayInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} via {}", self.gateway_addr, self.interface)
    }
}

/// Everything needed to address frames leaving through the default route.
///
/// The gateway MAC address and the source address are resolved independently
/// of each other, so one can fail while the other succeeds.
#[derive(Debug)]
pub struct EgressPath {
    pub gateway: GatewayInfo,
    pub gateway_mac: Result<MacAddr>,
    pub src_addr: Result<Ipv4Addr>,
}
