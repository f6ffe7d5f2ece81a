//! Print the egress path of this host.
use anyhow::Result;
use clap::Parser;
use egress::easy::{find_egress_path, Config};
use egress::interface::InterfaceAddressMethod;
use egress::models::RequestContext;
use egress::utilities::configure_logger;
use log::{info, LevelFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Minimum log level.
    #[arg(short = 'L', long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
    /// Size in bytes of the route dump receive buffer.
    #[arg(long, default_value_t = 8192)]
    receive_buffer_capacity: usize,
    /// Method to use to find the interface address.
    #[arg(long, default_value_t = InterfaceAddressMethod::Auto)]
    interface_address_method: InterfaceAddressMethod,
    /// Path to the neighbor table in procfs.
    #[arg(long, default_value = egress::neighbors::DEFAULT_PROCFS_ARP)]
    procfs_arp: String,
    /// Path to the arp binary.
    #[arg(long, default_value = egress::neighbors::DEFAULT_ARP_BINARY)]
    arp_binary: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    configure_logger(args.log_level);

    let config = Config {
        receive_buffer_capacity: args.receive_buffer_capacity,
        context: RequestContext::for_current_process(),
        procfs_arp: args.procfs_arp,
        arp_binary: args.arp_binary,
        interface_address_method: args.interface_address_method,
    };
    let path = find_egress_path(config)?;

    info!("gateway={}", path.gateway);
    match path.gateway_mac {
        Ok(mac) => info!("gateway_mac={}", mac),
        Err(error) => info!("gateway_mac unavailable: {}", error),
    }
    match path.src_addr {
        Ok(addr) => info!("src_addr={}", addr),
        Err(error) => info!("src_addr unavailable: {}", error),
    }
    Ok(())
}
