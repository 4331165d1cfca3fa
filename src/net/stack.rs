//! The boundary between interfaces and the protocol stack behind them.

use net::buffer::{
    PacketBuffer,
    SendError,
    SendResult,
};
use net::netif::Interface;
use net::repr::Ipv4Address;
use {
    Error,
    Result,
};

/// A protocol stack fed by one or more interfaces.
///
/// Both methods run inside the stack execution context and take the buffer
/// by value. On `SendError::Returned` the buffer goes back to the caller,
/// which disposes of it.
pub trait Stack: Send {
    /// Processes a received frame.
    fn input(&mut self, interface: &mut Interface, buffer: PacketBuffer) -> SendResult;

    /// Resolves dst, frames the packet and passes the frame on to
    /// `interface.link_output(...)`.
    fn output(
        &mut self,
        interface: &mut Interface,
        buffer: PacketBuffer,
        dst: Ipv4Address,
    ) -> SendResult;
}

/// Everything owned by the stack execution context: the stack itself and
/// its interfaces.
#[derive(Debug)]
pub struct Host<T> {
    pub stack: T,
    interfaces: Vec<Interface>,
    next_num: u8,
}

impl<T: Stack> Host<T> {
    pub fn new(stack: T) -> Host<T> {
        Host {
            stack,
            interfaces: vec![],
            next_num: 0,
        }
    }

    /// Adds an interface and runs init against it, returning the interface
    /// number. If init fails, the interface is discarded and its number is
    /// not handed out again until every other number has been.
    pub fn add_interface<F>(&mut self, init: F) -> Result<u8>
    where
        F: FnOnce(&mut Interface) -> Result<()>,
    {
        let num = self.unused_num().ok_or(Error::Exhausted)?;
        self.next_num = num.wrapping_add(1);

        let mut interface = Interface::new(num);
        if let Err(err) = init(&mut interface) {
            warn!("Initializing interface {} failed with {:?}.", num, err);
            return Err(err);
        }

        debug!("Added interface {:?}.", interface);
        self.interfaces.push(interface);
        Ok(num)
    }

    /// Returns the first number, counting up from next_num, which no
    /// interface uses.
    fn unused_num(&self) -> Option<u8> {
        (0 .. 256u16)
            .map(|i| self.next_num.wrapping_add(i as u8))
            .find(|num| self.interface(*num).is_none())
    }

    pub fn remove_interface(&mut self, num: u8) -> Option<Interface> {
        let i = self.interfaces.iter().position(|interface| interface.num == num)?;
        Some(self.interfaces.remove(i))
    }

    pub fn interface(&self, num: u8) -> Option<&Interface> {
        self.interfaces.iter().find(|interface| interface.num == num)
    }

    pub fn interface_mut(&mut self, num: u8) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|interface| interface.num == num)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// Delivers a received frame to the stack on behalf of interface num.
    pub fn input(&mut self, num: u8, buffer: PacketBuffer) -> SendResult {
        let stack = &mut self.stack;
        match self.interfaces.iter_mut().find(|interface| interface.num == num) {
            Some(interface) => stack.input(interface, buffer),
            None => Err(SendError::Returned(Error::NoOp, buffer)),
        }
    }

    /// Sends a network layer packet out through interface num.
    pub fn output(&mut self, num: u8, buffer: PacketBuffer, dst: Ipv4Address) -> SendResult {
        let stack = &mut self.stack;
        match self.interfaces.iter_mut().find(|interface| interface.num == num) {
            Some(interface) => interface.output(stack, buffer, dst),
            None => Err(SendError::Returned(Error::NoOp, buffer)),
        }
    }

    /// Marks interface num up. Returns false if it already was up or does
    /// not exist.
    pub fn set_up(&mut self, num: u8) -> bool {
        self.interface_mut(num)
            .map(|interface| interface.set_up())
            .unwrap_or(false)
    }

    /// Marks interface num down. Returns false if it already was down or does
    /// not exist.
    pub fn set_down(&mut self, num: u8) -> bool {
        self.interface_mut(num)
            .map(|interface| interface.set_down())
            .unwrap_or(false)
    }
}
