use std::net::Ipv4Addr;

use pnet::util::MacAddr;
use serde::Serialize;

/// An entry of the system neighbor (ARP) table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NeighborEntry {
    pub protocol_addr: Ipv4Addr,
    #[serde(serialize_with = "serialize_mac")]
    pub hardware_addr: MacAddr,
    /// The interface on which the neighbor was learned, if known.
    pub interface: Option<String>,
}

fn serialize_mac<S: serde::Serializer>(mac: &MacAddr, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(mac)
}
