use std::net::{
    IpAddr as StdIpAddr,
    Ipv4Addr as StdIpv4Addr,
};

use get_if_addrs;

use emacnet::net::buffer::Pool;
use emacnet::net::repr::EthernetAddress;

/// Default number of receive buffers a TAP may hold at once.
pub static POOL_CAPACITY: usize = 256;

lazy_static! {
    /// Default interface MAC address.
    pub static ref DEFAULT_ETH_ADDR: EthernetAddress = {
        // Use a local MAC address!
        EthernetAddress::new([0x06, 0x11, 0x22, 0x33, 0x44, 0x55])
    };
}

/// Returns the IPv4 address the host assigned to an interface. See tap.sh for
/// more info.
pub fn ifr_addr(ifr_name: &str) -> Option<StdIpv4Addr> {
    let interfaces = get_if_addrs::get_if_addrs().ok()?;
    interfaces
        .into_iter()
        .filter(|interface| interface.name == ifr_name)
        .filter_map(|interface| match interface.ip() {
            StdIpAddr::V4(ipv4_addr) => Some(ipv4_addr),
            _ => None,
        })
        .next()
}

pub fn pool() -> Pool {
    Pool::new(POOL_CAPACITY)
}
