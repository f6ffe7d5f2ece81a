#![doc = include_str!("../README.md")]

#[macro_use]
extern crate nix;

pub mod easy;
pub mod error;
pub mod interface;
pub mod models;
pub mod neighbors;
pub mod netlink;
pub mod utilities;

pub use easy::{
    find_default_gateway, find_egress_path, resolve_hardware_address, resolve_interface_address,
};
pub use error::*;
