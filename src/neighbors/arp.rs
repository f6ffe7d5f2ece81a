use std::fmt::{Debug, Formatter};
use std::fs;
use std::net::Ipv4Addr;
use std::process::Command;
use std::str::FromStr;

use log::{debug, error};
use pnet::util::MacAddr;

use crate::error::{Error, Result};
use crate::models::NeighborEntry;
use crate::utilities::parse_mac;

/// Path to the arp binary.
pub const DEFAULT_ARP_BINARY: &str = "/usr/sbin/arp";
/// Path to the neighbor table in procfs.
pub const DEFAULT_PROCFS_ARP: &str = "/proc/net/arp";

/// `ATF_COM` in `/proc/net/arp`: the entry has a hardware address.
const ATF_COM: u32 = 0x02;

/// A snapshot of the IPv4 neighbor (ARP) table.
pub struct NeighborTable {
    entries: Vec<NeighborEntry>,
}

impl NeighborTable {
    pub fn new(entries: Vec<NeighborEntry>) -> Self {
        Self { entries }
    }

    /// Read the neighbor table from procfs, or the entry of `addr` from arp,
    /// depending on the operating system.
    pub fn from_native(addr: Ipv4Addr) -> Result<Self> {
        if cfg!(target_os = "linux") {
            Self::from_procfs(DEFAULT_PROCFS_ARP)
        } else {
            Self::from_arp(DEFAULT_ARP_BINARY, addr)
        }
    }

    /// Read the neighbor entry of `addr` by parsing `arp -n <addr>` output on BSD systems.
    ///
    /// A missing entry yields an empty table.
    pub fn from_arp(path: &str, addr: Ipv4Addr) -> Result<Self> {
        let result = Command::new(path)
            .arg("-n")
            .arg(addr.to_string())
            .output()
            .map_err(|e| Error::unavailable("neighbor table", e))?;
        let output = String::from_utf8_lossy(&result.stdout);
        Ok(Self::from_arp_output(&output))
    }

    pub fn from_arp_output(output: &str) -> Self {
        Self::new(
            output
                .lines()
                .flat_map(NeighborEntry::from_arp_entry)
                .collect(),
        )
    }

    /// Read the neighbor table from procfs on Linux.
    pub fn from_procfs(path: &str) -> Result<Self> {
        let output =
            fs::read_to_string(path).map_err(|e| Error::unavailable("neighbor table", e))?;
        Ok(Self::from_procfs_output(&output))
    }

    pub fn from_procfs_output(output: &str) -> Self {
        Self::new(
            output
                .lines()
                .flat_map(NeighborEntry::from_procfs_entry)
                .collect(),
        )
    }

    pub fn all(&self) -> &[NeighborEntry] {
        &self.entries
    }

    /// Find the entry for `addr`, optionally restricted to one interface.
    pub fn get(&self, addr: Ipv4Addr, interface: Option<&str>) -> Option<&NeighborEntry> {
        self.entries.iter().find(|entry| {
            entry.protocol_addr == addr
                && match (interface, entry.interface.as_deref()) {
                    (Some(wanted), Some(actual)) => wanted == actual,
                    _ => true,
                }
        })
    }

    /// Return the hardware address of `addr`.
    pub fn resolve(&self, addr: Ipv4Addr, interface: Option<&str>) -> Result<MacAddr> {
        check_protocol_addr(addr)?;
        match self.get(addr, interface) {
            Some(entry) => {
                debug!(
                    "found ip {} at hw_addr {}",
                    entry.protocol_addr, entry.hardware_addr
                );
                Ok(entry.hardware_addr)
            }
            None => {
                error!("no neighbor entry for {}", addr);
                Err(Error::not_found(format!("no neighbor entry for {addr}")))
            }
        }
    }
}

impl Debug for NeighborTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.entries.fmt(f)
    }
}

/// Reject addresses that can never have a neighbor entry.
pub fn check_protocol_addr(addr: Ipv4Addr) -> Result<()> {
    if addr.is_unspecified() || addr.is_broadcast() {
        return Err(Error::InvalidArgument(format!(
            "{addr} cannot be resolved to a hardware address"
        )));
    }
    Ok(())
}

/// Resolve the hardware address of `addr` from the system neighbor table.
pub fn resolve_mac_address_v4(addr: Ipv4Addr, interface: Option<&str>) -> Result<MacAddr> {
    check_protocol_addr(addr)?;
    NeighborTable::from_native(addr)?.resolve(addr, interface)
}

impl NeighborEntry {
    /// Parse a line of `/proc/net/arp`.
    ///
    /// `IP address  HW type  Flags  HW address  Mask  Device`
    pub fn from_procfs_entry(line: &str) -> Result<Self> {
        let elems: Vec<&str> = line.split_whitespace().collect();
        if elems.len() < 6 {
            return Err(Error::protocol("invalid entry"));
        }
        let protocol_addr =
            Ipv4Addr::from_str(elems[0]).map_err(|e| Error::protocol(e.to_string()))?;
        let flags = u32::from_str_radix(elems[2].trim_start_matches("0x"), 16)
            .map_err(|e| Error::protocol(e.to_string()))?;
        let hardware_addr =
            parse_mac(elems[3]).ok_or_else(|| Error::protocol("invalid hardware address"))?;
        if flags & ATF_COM == 0 || hardware_addr == MacAddr::zero() {
            return Err(Error::protocol("incomplete entry"));
        }
        Ok(Self {
            protocol_addr,
            hardware_addr,
            interface: Some(elems[5].to_string()),
        })
    }

    /// Parse a line of `arp -n` output.
    ///
    /// `? (192.0.2.1) at 0:1b:c:d:ee:ff on en0 ifscope [ethernet]`
    pub fn from_arp_entry(line: &str) -> Result<Self> {
        let elems: Vec<&str> = line.split_whitespace().collect();
        if elems.len() < 4 || elems[2] != "at" {
            return Err(Error::protocol("invalid entry"));
        }
        let protocol_addr = elems[1]
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| Error::protocol("invalid entry"))
            .and_then(|s| Ipv4Addr::from_str(s).map_err(|e| Error::protocol(e.to_string())))?;
        let hardware_addr = parse_mac(elems[3]).ok_or_else(|| Error::protocol("incomplete entry"))?;
        let interface = match (elems.get(4), elems.get(5)) {
            (Some(&"on"), Some(interface)) => Some(interface.to_string()),
            _ => None,
        };
        Ok(Self {
            protocol_addr,
            hardware_addr,
            interface,
        })
    }
}
