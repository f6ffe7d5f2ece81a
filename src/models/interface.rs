use std::net::Ipv4Addr;

use serde::Serialize;

/// The IPv4 address bound to an interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InterfaceAddress {
    pub interface: String,
    pub addr: Ipv4Addr,
}
