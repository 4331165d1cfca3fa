//! The network interface record shared by the adapter and the stack.

use std::fmt::{
    Debug,
    Display,
    Formatter,
    Result as FmtResult,
};
use std::sync::Arc;

use net::buffer::{
    PacketBuffer,
    SendError,
    SendResult,
};
use net::mac::MacDevice;
use net::repr::{
    EthernetAddress,
    Ipv4Address,
};
use net::stack::Stack;
use {
    Error,
    Result,
};

/// Maximum length of a hardware address an interface can hold.
pub const MAX_HWADDR_LEN: usize = 6;

bitflags! {
    /// Capability and state flags of an interface.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// The link is up and the interface may send.
        const UP = 0x01;
        const BROADCAST = 0x02;
        /// Outbound packets need their destination resolved to a hardware
        /// address.
        const ETHARP = 0x08;
        const ETHERNET = 0x10;
        /// Multicast capable.
        const IGMP = 0x20;
    }
}

/// Network layer send: resolves dst and frames the packet before it reaches
/// the link layer.
pub type OutputFn = fn(&mut Interface, &mut dyn Stack, PacketBuffer, Ipv4Address) -> SendResult;

/// Link layer send: hands a complete frame to the hardware.
pub type LinkOutputFn = fn(&mut Interface, PacketBuffer) -> Result<()>;

/// Called after every up/down transition of an interface.
pub type StatusCallback = Box<dyn FnMut(&Interface) + Send>;

/// A network interface.
///
/// The record belongs to the stack execution context and is only read or
/// written from there, except while it is being initialized.
pub struct Interface {
    /// Two character name, e.g. "en".
    pub name: [char; 2],
    /// Number distinguishing interfaces which share a name.
    pub num: u8,
    pub mtu: u32,
    pub flags: Flags,
    /// Entry point for network layer packets.
    pub output: Option<OutputFn>,
    /// Entry point for complete link layer frames.
    pub link_output: Option<LinkOutputFn>,
    /// The MAC device backing the interface, if bound to one.
    pub mac: Option<Arc<dyn MacDevice>>,
    hwaddr: [u8; MAX_HWADDR_LEN],
    hwaddr_len: usize,
    status_callback: Option<StatusCallback>,
}

impl Interface {
    pub fn new(num: u8) -> Interface {
        Interface {
            name: [' ', ' '],
            num,
            mtu: 0,
            flags: Flags::empty(),
            output: None,
            link_output: None,
            mac: None,
            hwaddr: [0; MAX_HWADDR_LEN],
            hwaddr_len: 0,
            status_callback: None,
        }
    }

    pub fn hwaddr(&self) -> &[u8] {
        &self.hwaddr[.. self.hwaddr_len]
    }

    pub fn set_hwaddr(&mut self, addr: &[u8]) -> Result<()> {
        if addr.len() > MAX_HWADDR_LEN {
            return Err(Error::AddressTooLong(addr.len()));
        }

        self.hwaddr[.. addr.len()].copy_from_slice(addr);
        self.hwaddr_len = addr.len();
        Ok(())
    }

    /// Returns the hardware address as an Ethernet address, if it is one.
    pub fn ethernet_addr(&self) -> Option<EthernetAddress> {
        EthernetAddress::try_new(self.hwaddr()).ok()
    }

    pub fn is_up(&self) -> bool {
        self.flags.contains(Flags::UP)
    }

    /// Marks the interface up. Returns false if it already was.
    pub fn set_up(&mut self) -> bool {
        if self.is_up() {
            return false;
        }

        self.flags.insert(Flags::UP);
        info!("Interface {} is up.", self);
        self.notify_status();
        true
    }

    /// Marks the interface down. Returns false if it already was.
    pub fn set_down(&mut self) -> bool {
        if !self.is_up() {
            return false;
        }

        self.flags.remove(Flags::UP);
        info!("Interface {} is down.", self);
        self.notify_status();
        true
    }

    pub fn set_status_callback(&mut self, callback: StatusCallback) {
        self.status_callback = Some(callback);
    }

    /// Sends a network layer packet through the installed output entry point.
    pub fn output(
        &mut self,
        stack: &mut dyn Stack,
        buffer: PacketBuffer,
        dst: Ipv4Address,
    ) -> SendResult {
        match self.output {
            Some(output) => output(self, stack, buffer, dst),
            None => Err(SendError::Returned(Error::NoOp, buffer)),
        }
    }

    /// Sends a link layer frame through the installed link output entry
    /// point. The buffer is consumed either way.
    pub fn link_output(&mut self, buffer: PacketBuffer) -> Result<()> {
        match self.link_output {
            Some(link_output) => link_output(self, buffer),
            None => {
                debug!("Interface {} has no link output, dropping {:?}.", self, buffer);
                Err(Error::NoOp)
            }
        }
    }

    fn notify_status(&mut self) {
        if let Some(mut callback) = self.status_callback.take() {
            callback(self);
            if self.status_callback.is_none() {
                self.status_callback = Some(callback);
            }
        }
    }
}

impl Display for Interface {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}{}{}", self.name[0], self.name[1], self.num)
    }
}

impl Debug for Interface {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("num", &self.num)
            .field("mtu", &self.mtu)
            .field("flags", &self.flags)
            .field("hwaddr", &self.hwaddr())
            .finish()
    }
}
