//! Find the default gateway and resolve link-layer addresses.
//!
//! # Examples
//!
//! ```no_run
//! use egress::neighbors::{find_gateway, resolve_mac_address_v4, SystemInterfaceNames};
//! use egress::netlink::{RouteChannel, RouteRequest};
//! use egress::models::RequestContext;
//!
//! fn main() -> Result<(), egress::Error> {
//!     let context = RequestContext::for_current_process();
//!     let mut channel = RouteChannel::open()?;
//!     let dump = channel.query(&RouteRequest::default(), &context, 8192)?;
//!
//!     let gateway = find_gateway(&dump, &SystemInterfaceNames)?;
//!     let mac = resolve_mac_address_v4(gateway.gateway_addr, Some(&gateway.interface))?;
//!
//!     println!("{} ({})", gateway, mac);
//!     Ok(())
//! }
//! ```
mod arp;
mod route;

pub use arp::*;
pub use route::*;
