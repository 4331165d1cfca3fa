//! Addresses and frame views.
//!
//! Only the link layer is parsed here; anything above it belongs to the stack
//! sitting behind an interface.

pub mod ethernet;
pub mod ipv4;

pub use self::ethernet::{
    eth_types,
    Address as EthernetAddress,
    Frame as EthernetFrame,
};
pub use self::ipv4::Address as Ipv4Address;
