//! Find the IPv4 address bound to an interface.
//!
//! Two strategies are available: walking the list returned by `getifaddrs(3)`
//! (all platforms) and asking the kernel with the `SIOCGIFADDR` ioctl (Linux).
//! [`PlatformResolver`] is the one used by default on the current platform.
mod ifaddrs;
#[cfg(target_os = "linux")]
mod ioctl;

pub use ifaddrs::*;
#[cfg(target_os = "linux")]
pub use ioctl::IoctlResolver;

use std::net::Ipv4Addr;

use strum::{Display, EnumString};

use crate::error::{Error, Result};

/// Resolve an interface name to its IPv4 address.
pub trait InterfaceAddressResolver {
    fn resolve(&self, interface: &str) -> Result<Ipv4Addr>;
}

#[cfg(target_os = "linux")]
pub type PlatformResolver = IoctlResolver;
#[cfg(not(target_os = "linux"))]
pub type PlatformResolver = IfAddrsResolver;

/// Strategy used to find interface addresses.
#[derive(Copy, Clone, Debug, Display, EnumString, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum InterfaceAddressMethod {
    /// The platform default.
    Auto,
    Enumeration,
    Ioctl,
}

/// Return the IPv4 address of `interface` using the given method.
pub fn resolve_interface_address_with(
    interface: &str,
    method: InterfaceAddressMethod,
) -> Result<Ipv4Addr> {
    match method {
        InterfaceAddressMethod::Auto => PlatformResolver::default().resolve(interface),
        InterfaceAddressMethod::Enumeration => IfAddrsResolver.resolve(interface),
        #[cfg(target_os = "linux")]
        InterfaceAddressMethod::Ioctl => IoctlResolver.resolve(interface),
        #[cfg(not(target_os = "linux"))]
        InterfaceAddressMethod::Ioctl => Err(Error::Unsupported(
            "SIOCGIFADDR lookup is only implemented on Linux",
        )),
    }
}

pub(crate) fn no_ipv4_address(interface: &str) -> Error {
    Error::not_found(format!(
        "interface {interface} does not exist or has no IPv4 address"
    ))
}
