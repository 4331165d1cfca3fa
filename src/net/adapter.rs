//! Binds a MAC device to an interface of a stack running in a stack execution
//! context.
//!
//! Buffer ownership at each boundary:
//!
//! | Call | Buffer on success | Buffer on failure |
//! |---|---|---|
//! | `output` | passed to the stack's resolver | handed back (`LinkDown`) |
//! | `low_level_output` | consumed by the MAC device | consumed by the MAC device |
//! | `on_receive` | moved into the stack context | freed here |
//! | `input` | owned by the stack | freed here |
//!
//! Received frames and link changes arrive on whatever thread the device
//! uses. Neither touches the interface before being marshaled into the stack
//! context.

use std::sync::Arc;

use net::buffer::{
    PacketBuffer,
    SendError,
    SendResult,
};
use net::mac::MacDevice;
use net::marshal::{
    Handle,
    Posted,
};
use net::netif::{
    Flags,
    Interface,
    MAX_HWADDR_LEN,
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

/// Initializes interface on top of mac.
///
/// Copies the device's hardware address, MTU and name, installs the output
/// entry points, subscribes to received frames and link changes on behalf of
/// interface number `interface.num` in context, and finally powers the
/// device up. The interface stays down; it goes up once the device reports
/// its link. If the device fails to power up, the subscriptions are dropped
/// again and the device no longer reaches the stack.
///
/// Runs before the interface is visible to anything else, so it mutates the
/// interface directly.
pub fn init<T>(interface: &mut Interface, mac: Arc<dyn MacDevice>, context: &Handle<Host<T>>) -> Result<()>
where
    T: Stack + 'static,
{
    let hwaddr_len = mac.hwaddr_len();
    if hwaddr_len > MAX_HWADDR_LEN {
        warn!(
            "MAC device reports a {} byte hardware address, at most {} fit.",
            hwaddr_len, MAX_HWADDR_LEN
        );
        return Err(Error::AddressTooLong(hwaddr_len));
    }

    let mut hwaddr = [0; MAX_HWADDR_LEN];
    mac.hwaddr(&mut hwaddr[.. hwaddr_len]);
    interface.set_hwaddr(&hwaddr[.. hwaddr_len])?;
    interface.mtu = mac.mtu();
    interface.name = mac.ifname();

    let num = interface.num;
    let input_context = context.clone();
    mac.set_input_callback(Box::new(move |buffer| {
        let _ = on_receive(&input_context, num, buffer);
    }));
    let link_context = context.clone();
    mac.set_link_state_callback(Box::new(move |up| {
        let _ = on_link_state_change(&link_context, num, up);
    }));

    interface.flags = Flags::BROADCAST | Flags::ETHARP | Flags::ETHERNET | Flags::IGMP;
    interface.output = Some(output);
    interface.link_output = Some(low_level_output);
    interface.mac = Some(mac.clone());

    if !mac.power_up() {
        warn!("MAC device for interface {} failed to power up.", interface);
        unsubscribe(&*mac);
        interface.output = None;
        interface.link_output = None;
        interface.mac = None;
        return Err(Error::DeviceInitFailed);
    }

    debug!(
        "Interface {} initialized with MTU {} and hardware address {:?}.",
        interface,
        interface.mtu,
        interface.hwaddr()
    );
    Ok(())
}

/// Network layer send. Only passes the packet on while the interface is up;
/// otherwise the buffer is handed back with `LinkDown`.
pub fn output(
    interface: &mut Interface,
    stack: &mut dyn Stack,
    buffer: PacketBuffer,
    dst: Ipv4Address,
) -> SendResult {
    if !interface.is_up() {
        debug!("Interface {} is down, not sending to {}.", interface, dst);
        return Err(SendError::Returned(Error::LinkDown, buffer));
    }

    stack.output(interface, buffer, dst)
}

/// Link layer send. The MAC device consumes the buffer whether or not the
/// transmission succeeds, so there is nothing to hand back or retry.
pub fn low_level_output(interface: &mut Interface, buffer: PacketBuffer) -> Result<()> {
    let mac = match interface.mac {
        Some(ref mac) => mac.clone(),
        None => {
            debug!("Interface {} has no MAC device, dropping {:?}.", interface, buffer);
            return Err(Error::NoOp);
        }
    };

    if mac.link_out(buffer) {
        Ok(())
    } else {
        debug!("MAC device for interface {} failed to transmit.", interface);
        Err(Error::TransmitFailed)
    }
}

/// Entry point for frames received by the MAC device of interface num.
///
/// May be called from any thread. The frame is moved into the stack context
/// and delivered there by `input(...)`. If it cannot be queued, it is freed.
pub fn on_receive<T>(context: &Handle<Host<T>>, num: u8, buffer: PacketBuffer) -> Result<()>
where
    T: Stack + 'static,
{
    let len = buffer.len();
    context
        .post(move |host: &mut Host<T>| {
            let _ = input(host, num, buffer);
        })
        .map_err(|err| {
            warn!(
                "Dropping {} byte frame received on interface {}, {:?}.",
                len, num, err
            );
            err
        })
}

/// Delivers a received frame to the stack. Runs in the stack context.
///
/// If the stack hands the frame back, it is freed here and `InputRejected`
/// is returned. This is the only place the adapter frees a buffer.
pub fn input<T: Stack>(host: &mut Host<T>, num: u8, buffer: PacketBuffer) -> Result<()> {
    match host.input(num, buffer) {
        Ok(()) => Ok(()),
        Err(SendError::Returned(err, buffer)) => {
            debug!("Interface {} input error {:?}, freeing {:?}.", num, err, buffer);
            buffer.free();
            Err(Error::InputRejected)
        }
        Err(SendError::Consumed(err)) => {
            debug!("Interface {} input error {:?}.", num, err);
            Err(Error::InputRejected)
        }
    }
}

/// Entry point for link changes reported by the MAC device of interface num.
///
/// May be called from any thread. Blocks until the change has been applied
/// in the stack context, unless called from the stack context itself, in
/// which case the change is applied right after the current job.
pub fn on_link_state_change<T>(context: &Handle<Host<T>>, num: u8, up: bool) -> Result<Posted>
where
    T: Stack + 'static,
{
    context
        .post_and_wait(move |host: &mut Host<T>| {
            link_state_changed(host, num, up);
        })
        .map_err(|err| {
            warn!(
                "Lost link {} event for interface {}, {:?}.",
                if up { "up" } else { "down" },
                num,
                err
            );
            err
        })
}

/// Applies a link change to interface num. Runs in the stack context.
///
/// Returns true if the interface changed state; reporting the state it is
/// already in does nothing.
pub fn link_state_changed<T: Stack>(host: &mut Host<T>, num: u8, up: bool) -> bool {
    if host.interface(num).is_none() {
        warn!("Link change for unknown interface {}.", num);
        return false;
    }

    if up {
        host.set_up(num)
    } else {
        host.set_down(num)
    }
}

/// Detaches interface from its MAC device: marks the interface down, drops
/// the adapter's subscriptions and entry points, then powers the device down.
pub fn deinit(interface: &mut Interface) -> Result<()> {
    interface.set_down();
    interface.output = None;
    interface.link_output = None;

    let mac = interface.mac.take().ok_or(Error::NoOp)?;
    unsubscribe(&*mac);

    if !mac.power_down() {
        warn!("MAC device for interface {} failed to power down.", interface);
    }
    Ok(())
}

/// Replaces the adapter's subscriptions on mac with ones which free frames
/// and ignore link changes.
fn unsubscribe(mac: &dyn MacDevice) {
    mac.set_input_callback(Box::new(|buffer: PacketBuffer| buffer.free()));
    mac.set_link_state_callback(Box::new(|_| {}));
}
