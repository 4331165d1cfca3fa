//! A minimal frame level stack.
//!
//! `EthernetStack` does just enough to sit behind an interface: it filters
//! inbound frames by destination and EtherType and queues them for a reader,
//! and it frames outbound packets for neighbors it already knows. Protocol
//! processing (ARP, IP, ...) is left to whatever consumes the queue.

use std::collections::VecDeque;
use std::time::Duration;

use net::buffer::{
    PacketBuffer,
    SendError,
    SendResult,
};
use net::neighbor::NeighborCache;
use net::netif::Interface;
use net::repr::{
    eth_types,
    EthernetFrame,
    Ipv4Address,
};
use net::stack::Stack;
use net::time::{
    Env,
    SystemEnv,
};
use Error;

/// Lifetime of learned neighbor mappings.
pub const NEIGHBOR_LIFETIME: Duration = Duration::from_secs(60);

/// A received frame together with the number of the interface it came in on.
#[derive(Debug)]
pub struct Received {
    pub num: u8,
    pub buffer: PacketBuffer,
}

#[derive(Debug)]
pub struct EthernetStack<T: Env = SystemEnv> {
    /// IPv4 to Ethernet mappings for outbound packets.
    pub neighbors: NeighborCache<T>,
    rx_queue: VecDeque<Received>,
    rx_capacity: usize,
}

impl EthernetStack<SystemEnv> {
    /// Creates a stack queueing up to rx_capacity inbound frames.
    pub fn new(rx_capacity: usize) -> EthernetStack<SystemEnv> {
        EthernetStack::with_env(rx_capacity, SystemEnv::new())
    }
}

impl<T: Env> EthernetStack<T> {
    pub fn with_env(rx_capacity: usize, time_env: T) -> EthernetStack<T> {
        EthernetStack {
            neighbors: NeighborCache::new(NEIGHBOR_LIFETIME, time_env),
            rx_queue: VecDeque::with_capacity(rx_capacity),
            rx_capacity,
        }
    }

    /// Takes the oldest queued frame.
    pub fn recv(&mut self) -> Option<Received> {
        self.rx_queue.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.rx_queue.len()
    }

    fn accepts(&self, interface: &Interface, frame: &EthernetFrame<&[u8]>) -> bool {
        let dst_addr = frame.dst_addr();
        let for_us = match interface.ethernet_addr() {
            Some(eth_addr) => dst_addr == eth_addr,
            None => false,
        };

        if !(for_us || dst_addr.is_broadcast() || dst_addr.is_multicast()) {
            debug!("Ignoring Ethernet frame with destination {}.", dst_addr);
            return false;
        }

        match frame.payload_type() {
            eth_types::IPV4 | eth_types::ARP => true,
            i => {
                debug!("Ignoring Ethernet frame with type {:#06x}.", i);
                false
            }
        }
    }
}

impl<T: Env> Stack for EthernetStack<T> {
    fn input(&mut self, interface: &mut Interface, buffer: PacketBuffer) -> SendResult {
        let accepted = match EthernetFrame::try_new(buffer.as_ref()) {
            Ok(frame) => self.accepts(interface, &frame),
            Err(err) => return Err(SendError::Returned(err, buffer)),
        };

        if !accepted {
            return Err(SendError::Returned(Error::Ignored, buffer));
        }

        if self.rx_queue.len() >= self.rx_capacity {
            debug!("Receive queue is full.");
            return Err(SendError::Returned(Error::Exhausted, buffer));
        }

        self.rx_queue.push_back(Received {
            num: interface.num,
            buffer,
        });
        Ok(())
    }

    fn output(
        &mut self,
        interface: &mut Interface,
        mut buffer: PacketBuffer,
        dst: Ipv4Address,
    ) -> SendResult {
        let src_addr = match interface.ethernet_addr() {
            Some(eth_addr) => eth_addr,
            None => return Err(SendError::Returned(Error::Address, buffer)),
        };

        let dst_addr = match self.neighbors.lookup(dst) {
            Some(eth_addr) => eth_addr,
            None => {
                debug!("No neighbor entry for {}.", dst);
                return Err(SendError::Returned(Error::Address, buffer));
            }
        };

        let mut header = [0; EthernetFrame::<&[u8]>::HEADER_LEN];
        match EthernetFrame::try_new(&mut header[..]) {
            Ok(mut frame) => {
                frame.set_dst_addr(dst_addr);
                frame.set_src_addr(src_addr);
                frame.set_payload_type(eth_types::IPV4);
            }
            Err(err) => return Err(SendError::Returned(err, buffer)),
        }
        buffer.prepend(&header);

        interface.link_output(buffer)?;
        Ok(())
    }
}
