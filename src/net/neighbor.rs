use std::collections::HashMap;
use std::time::{
    Duration,
    Instant,
};

use net::repr::{
    EthernetAddress,
    Ipv4Address,
};
use net::time::{
    Env,
    SystemEnv,
};

#[derive(Debug)]
struct Entry {
    eth_addr: EthernetAddress,
    /// None for entries which never expire.
    expires_at: Option<Instant>,
}

/// IPv4 to Ethernet address mappings used to frame outbound packets.
///
/// Static entries stay until removed. Learned entries expire a fixed time
/// after they were last refreshed.
#[derive(Debug)]
pub struct NeighborCache<T: Env = SystemEnv> {
    entries: HashMap<Ipv4Address, Entry>,
    lifetime: Duration,
    time_env: T,
}

impl<T: Env> NeighborCache<T> {
    /// Creates a cache where learned mappings live for lifetime.
    pub fn new(lifetime: Duration, time_env: T) -> NeighborCache<T> {
        NeighborCache {
            entries: HashMap::new(),
            lifetime,
            time_env,
        }
    }

    /// Adds a mapping which never expires.
    pub fn insert_static(&mut self, ipv4_addr: Ipv4Address, eth_addr: EthernetAddress) {
        self.entries.insert(
            ipv4_addr,
            Entry {
                eth_addr,
                expires_at: None,
            },
        );
    }

    /// Adds or refreshes a learned mapping. Static mappings are left alone.
    pub fn insert(&mut self, ipv4_addr: Ipv4Address, eth_addr: EthernetAddress) {
        let expires_at = self.time_env.now_instant() + self.lifetime;

        match self.entries.get(&ipv4_addr) {
            Some(&Entry {
                expires_at: None, ..
            }) => {
                debug!("Keeping static mapping for {}.", ipv4_addr);
            }
            _ => {
                self.entries.insert(
                    ipv4_addr,
                    Entry {
                        eth_addr,
                        expires_at: Some(expires_at),
                    },
                );
            }
        }
    }

    /// Looks up the Ethernet address for an IPv4 address.
    pub fn lookup(&mut self, ipv4_addr: Ipv4Address) -> Option<EthernetAddress> {
        self.purge();
        self.entries.get(&ipv4_addr).map(|entry| entry.eth_addr)
    }

    pub fn remove(&mut self, ipv4_addr: Ipv4Address) -> Option<EthernetAddress> {
        self.entries.remove(&ipv4_addr).map(|entry| entry.eth_addr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops learned mappings which have expired.
    pub fn purge(&mut self) {
        let now = self.time_env.now_instant();
        self.entries.retain(|_, entry| match entry.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        });
    }

    pub fn time_env_mut(&mut self) -> &mut T {
        &mut self.time_env
    }
}
