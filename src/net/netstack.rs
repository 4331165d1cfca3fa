//! Bringing a network stack up on top of a MAC device, and down again.

use std::sync::Arc;

use net::adapter;
use net::buffer::{
    PacketBuffer,
    SendError,
    SendResult,
};
use net::mac::MacDevice;
use net::marshal::{
    Config,
    Executor,
    Handle,
};
use net::repr::Ipv4Address;
use net::stack::{
    Host,
    Stack,
};
use {
    Error,
    Result,
};

/// A stack running in its own execution context with a single interface
/// bound to a MAC device.
pub struct NetStack<T: Stack + 'static> {
    executor: Executor<Host<T>>,
    num: u8,
}

impl<T: Stack + 'static> NetStack<T> {
    /// Starts a stack execution context for stack and adds an interface on
    /// top of mac. The interface is initialized inside the context.
    pub fn bringup(mac: Arc<dyn MacDevice>, stack: T, config: &Config) -> Result<NetStack<T>> {
        let executor = Executor::spawn(config, Host::new(stack))?;
        let context = executor.handle();

        let num = executor.handle().call(move |host: &mut Host<T>| {
            host.add_interface(|interface| adapter::init(interface, mac, &context))
        })??;

        info!("Stack '{}' is up with interface {}.", config.name, num);
        Ok(NetStack { executor, num })
    }

    pub fn handle(&self) -> Handle<Host<T>> {
        self.executor.handle()
    }

    /// Returns the number of the stack's interface.
    pub fn num(&self) -> u8 {
        self.num
    }

    /// Runs f against the stack and its interfaces inside the stack context.
    pub fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Host<T>) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.executor.handle().call(f)
    }

    pub fn is_up(&self) -> Result<bool> {
        let num = self.num;
        self.call(move |host: &mut Host<T>| {
            host.interface(num)
                .map(|interface| interface.is_up())
                .unwrap_or(false)
        })
    }

    /// Returns the interface's hardware address in "00:11:22:33:44:55" form.
    pub fn mac_address(&self) -> Result<String> {
        let num = self.num;
        let hwaddr = self.call(move |host: &mut Host<T>| {
            host.interface(num).map(|interface| interface.hwaddr().to_vec())
        })?;

        let hwaddr = hwaddr.ok_or(Error::NoOp)?;
        Ok(hwaddr
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<_>>()
            .join(":"))
    }

    /// Sends a network layer packet to dst through the interface.
    pub fn send(&self, buffer: PacketBuffer, dst: Ipv4Address) -> SendResult {
        let num = self.num;
        match self.call(move |host: &mut Host<T>| host.output(num, buffer, dst)) {
            Ok(result) => result,
            // The job never ran and took the buffer down with it.
            Err(err) => Err(SendError::Consumed(err)),
        }
    }

    /// Detaches the interface from its MAC device, stops the stack context
    /// and returns the stack.
    pub fn bringdown(self) -> Result<T> {
        let num = self.num;
        let detached = self.call(move |host: &mut Host<T>| match host.remove_interface(num) {
            Some(mut interface) => adapter::deinit(&mut interface),
            None => Err(Error::NoOp),
        })?;

        if let Err(err) = detached {
            warn!("Detaching interface {} failed with {:?}.", num, err);
        }

        let host = self.executor.shutdown()?;
        info!("Stack is down.");
        Ok(host.stack)
    }
}
