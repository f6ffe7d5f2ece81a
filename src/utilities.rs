//! Utilities.
use std::ffi::CStr;
use std::io;

use log::LevelFilter;
use nix::libc;
use pnet::util::MacAddr;

use crate::error::{Error, Result};

/// Maximum length of an interface name, including the trailing NUL.
pub const IF_NAMESIZE: usize = 16;

/// Log to stderr with the given minimum level.
pub fn configure_logger(level: LevelFilter) {
    env_logger::builder()
        .filter_level(level)
        .format_timestamp_micros()
        .init();
}

/// Return the name of the interface with the given index.
pub fn interface_name(index: u32) -> Result<String> {
    let mut buffer = [0 as libc::c_char; IF_NAMESIZE];
    // SAFETY: the buffer holds IF_NAMESIZE bytes as required by if_indextoname(3).
    let name = unsafe { libc::if_indextoname(index, buffer.as_mut_ptr()) };
    if name.is_null() {
        return Err(Error::not_found(format!(
            "no interface with index {index}: {}",
            io::Error::last_os_error()
        )));
    }
    // SAFETY: on success the buffer contains a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    Ok(name.to_string_lossy().into_owned())
}

/// Check that an interface name can be passed to the OS.
pub fn validate_interface_name(interface: &str) -> Result<()> {
    if interface.is_empty() {
        return Err(Error::InvalidArgument("empty interface name".to_string()));
    }
    if interface.len() >= IF_NAMESIZE || interface.contains('\0') {
        return Err(Error::InvalidArgument(format!(
            "invalid interface name {interface:?}"
        )));
    }
    Ok(())
}

/// Parse a colon-separated MAC address.
///
/// BSD tools print octets without leading zeroes (e.g. `0:1b:c:d:e:f`), so
/// one or two hex digits are accepted per octet.
pub fn parse_mac(s: &str) -> Option<MacAddr> {
    let mut octets = [0u8; 6];
    let mut parts = s.split(':');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(MacAddr::new(
        octets[0], octets[1], octets[2], octets[3], octets[4], octets[5],
    ))
}
