use std::collections::HashMap;
use std::net::Ipv4Addr;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::models::GatewayInfo;
use crate::netlink::{
    Attributes, Messages, AF_INET, RTA_DST, RTA_GATEWAY, RTA_OIF, RTA_PRIORITY, RTA_TABLE,
    RTMSG_LEN, RTM_NEWROUTE, RT_TABLE_MAIN,
};
use crate::utilities::interface_name;

/// Translate interface indices into names.
pub trait InterfaceNames {
    fn name(&self, index: u32) -> Result<String>;
}

/// Interface names known by the operating system.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemInterfaceNames;

impl InterfaceNames for SystemInterfaceNames {
    fn name(&self, index: u32) -> Result<String> {
        interface_name(index)
    }
}

impl InterfaceNames for HashMap<u32, String> {
    fn name(&self, index: u32) -> Result<String> {
        self.get(&index)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no interface with index {index}")))
    }
}

/// A route decoded from an `RTM_NEWROUTE` frame.
///
/// Attribute values are only decoded for IPv4 routes of the main table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteRecord {
    pub family: u8,
    pub table: u32,
    pub dst_len: u8,
    pub destination: Option<Ipv4Addr>,
    pub output_interface: Option<u32>,
    pub gateway: Option<Ipv4Addr>,
    pub priority: Option<u32>,
}

impl RouteRecord {
    /// Decode a `struct rtmsg` followed by its attributes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < RTMSG_LEN {
            return Err(Error::protocol(format!(
                "route message of {} bytes is shorter than its header",
                payload.len()
            )));
        }
        let mut record = RouteRecord {
            family: payload[0],
            dst_len: payload[1],
            table: payload[4] as u32,
            ..Default::default()
        };
        if record.family != AF_INET {
            return Ok(record);
        }

        let mut attributes = Vec::new();
        let mut fault = None;
        for attribute in Attributes::new(&payload[RTMSG_LEN..]) {
            match attribute {
                Ok(attribute) => attributes.push(attribute),
                Err(error) => fault = Some(error),
            }
        }
        // Table ids above 255 only fit in the attribute.
        if let Some(table) = attributes.iter().rev().find(|a| a.kind == RTA_TABLE) {
            if let Ok(table) = table.as_u32() {
                record.table = table;
            }
        }
        // Other tables are skipped whatever their attributes hold.
        if !record.is_ipv4_main() {
            return Ok(record);
        }
        if let Some(error) = fault {
            return Err(error);
        }

        for attribute in attributes {
            match attribute.kind {
                RTA_DST => record.destination = Some(Ipv4Addr::from(attribute.as_octets()?)),
                RTA_OIF => record.output_interface = Some(attribute.as_u32()?),
                RTA_GATEWAY => record.gateway = Some(Ipv4Addr::from(attribute.as_octets()?)),
                RTA_PRIORITY => record.priority = Some(attribute.as_u32()?),
                RTA_TABLE => record.table = attribute.as_u32()?,
                _ => {}
            }
        }
        Ok(record)
    }

    pub fn is_ipv4_main(&self) -> bool {
        self.family == AF_INET && self.table == RT_TABLE_MAIN as u32
    }

    pub fn is_default(&self) -> bool {
        self.dst_len == 0
    }
}

/// Decode every IPv4 route of the main table contained in a dump reply.
pub fn routes(buffer: &[u8]) -> Result<Vec<RouteRecord>> {
    let mut records = Vec::new();
    for message in Messages::new(buffer) {
        let message = message?;
        if message.header.message_type != RTM_NEWROUTE {
            continue;
        }
        let record = RouteRecord::parse(message.payload)?;
        if record.is_ipv4_main() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Find the first IPv4 main-table route carrying both an output interface and a gateway.
///
/// Frames are considered in the order the kernel dumped them. A fault in the
/// stream is only reported if no usable route was found before it.
pub fn find_gateway<N: InterfaceNames>(buffer: &[u8], names: &N) -> Result<GatewayInfo> {
    for message in Messages::new(buffer) {
        let message = message?;
        if message.header.message_type != RTM_NEWROUTE {
            debug!(
                "skipping frame of type {} in route dump",
                message.header.message_type
            );
            continue;
        }
        let record = RouteRecord::parse(message.payload)?;
        if !record.is_ipv4_main() {
            debug!(
                "skipping route family={} table={}",
                record.family, record.table
            );
            continue;
        }
        if let (Some(index), Some(gateway_addr)) = (record.output_interface, record.gateway) {
            let interface = names.name(index)?;
            let gateway = GatewayInfo {
                gateway_addr,
                interface,
            };
            if record.is_default() {
                info!("default gateway: {}", gateway);
            } else {
                info!("gateway: {} (dst_len={})", gateway, record.dst_len);
            }
            return Ok(gateway);
        }
    }
    Err(Error::not_found("no default gateway found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::{align, RTA_HDRLEN, RT_TABLE_COMPAT};

    fn route(family: u8, table: u8, attributes: &[(u16, &[u8])]) -> Vec<u8> {
        let mut payload = vec![0u8; RTMSG_LEN];
        payload[0] = family;
        payload[4] = table;
        for (kind, value) in attributes {
            let length = RTA_HDRLEN + value.len();
            let start = payload.len();
            payload.resize(start + align(length).unwrap(), 0);
            payload[start..start + 2].copy_from_slice(&(length as u16).to_ne_bytes());
            payload[start + 2..start + 4].copy_from_slice(&kind.to_ne_bytes());
            payload[start + 4..start + length].copy_from_slice(value);
        }
        payload
    }

    #[test]
    fn test_parse_record() {
        let payload = route(
            AF_INET,
            RT_TABLE_MAIN,
            &[
                (RTA_TABLE, &254u32.to_ne_bytes()),
                (RTA_PRIORITY, &100u32.to_ne_bytes()),
                (RTA_GATEWAY, &[192, 0, 2, 1]),
                (RTA_OIF, &2u32.to_ne_bytes()),
            ],
        );
        let record = RouteRecord::parse(&payload).unwrap();
        assert!(record.is_ipv4_main());
        assert!(record.is_default());
        assert_eq!(record.gateway, Some(Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(record.output_interface, Some(2));
        assert_eq!(record.priority, Some(100));
    }

    #[test]
    fn test_parse_table_attribute() {
        let payload = route(AF_INET, RT_TABLE_COMPAT, &[(RTA_TABLE, &1000u32.to_ne_bytes())]);
        let record = RouteRecord::parse(&payload).unwrap();
        assert_eq!(record.table, 1000);
        assert!(!record.is_ipv4_main());
    }

    #[test]
    fn test_parse_ipv6_skips_attributes() {
        let payload = route(10, RT_TABLE_MAIN, &[(RTA_GATEWAY, &[0xfe; 16])]);
        let record = RouteRecord::parse(&payload).unwrap();
        assert_eq!(record.family, 10);
        assert_eq!(record.gateway, None);
    }

    #[test]
    fn test_parse_other_table_skips_attributes() {
        let payload = route(AF_INET, 255, &[(RTA_GATEWAY, &[127, 0, 1])]);
        let record = RouteRecord::parse(&payload).unwrap();
        assert_eq!(record.table, 255);
        assert_eq!(record.gateway, None);
    }

    #[test]
    fn test_parse_short_header() {
        assert!(matches!(
            RouteRecord::parse(&[AF_INET, 0, 0]),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_bad_gateway_length() {
        let payload = route(AF_INET, RT_TABLE_MAIN, &[(RTA_GATEWAY, &[192, 0, 2])]);
        assert!(matches!(
            RouteRecord::parse(&payload),
            Err(Error::Protocol(_))
        ));
    }
}
