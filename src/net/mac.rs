//! The hardware independent MAC device contract.
//!
//! A MAC device sends and receives raw frames and reports its link status.
//! Drivers implement `MacDevice`; the adapter only ever talks to a device
//! through this trait, picked when the interface is configured.

use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};
use std::sync::{
    Arc,
    RwLock,
    RwLockReadGuard,
    RwLockWriteGuard,
};

use net::buffer::PacketBuffer;
use net::repr::EthernetAddress;
use {
    Error,
    Result,
};

/// Called by a device with each received frame. Ownership of the buffer
/// passes to the callee.
pub type InputCallback = Box<dyn Fn(PacketBuffer) + Send + Sync>;

/// Called by a device whenever its link goes up (true) or down (false).
pub type LinkStateCallback = Box<dyn Fn(bool) + Send + Sync>;

/// A low level interface for sending frames across an Ethernet link.
///
/// Callbacks may be invoked from any thread, including from inside a call to
/// `link_out` or `power_up` on the caller's own thread.
pub trait MacDevice: Send + Sync {
    /// Sends a frame.
    ///
    /// The device takes ownership of the buffer whatever the outcome. A false
    /// return reports a failed transmission; there is nothing to hand back.
    fn link_out(&self, buffer: PacketBuffer) -> bool;

    /// Subscribes to received frames, replacing any previous subscriber.
    fn set_input_callback(&self, callback: InputCallback);

    /// Subscribes to link changes, replacing any previous subscriber.
    fn set_link_state_callback(&self, callback: LinkStateCallback);

    /// Returns the length of the hardware address in bytes.
    fn hwaddr_len(&self) -> usize;

    /// Copies the hardware address into addr, which holds at least
    /// `hwaddr_len()` bytes.
    fn hwaddr(&self, addr: &mut [u8]);

    /// Returns the [MTU](https://en.wikipedia.org/wiki/Maximum_transmission_unit)
    /// of the underlying hardware.
    fn mtu(&self) -> u32;

    /// Returns a two character name for the device, e.g. "en".
    fn ifname(&self) -> [char; 2];

    fn power_up(&self) -> bool;

    fn power_down(&self) -> bool;
}

/// The input and link state subscribers of a single device.
///
/// Each slot holds at most one subscriber. Callbacks are invoked without any
/// lock held, so a subscriber may block or re-subscribe from inside a call.
#[derive(Default)]
pub struct Subscriptions {
    input: RwLock<Option<Arc<dyn Fn(PacketBuffer) + Send + Sync>>>,
    link_state: RwLock<Option<Arc<dyn Fn(bool) + Send + Sync>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(err) => err.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(err) => err.into_inner(),
    }
}

impl Subscriptions {
    pub fn new() -> Subscriptions {
        Subscriptions::default()
    }

    /// Installs the input subscriber and returns true if one was replaced.
    pub fn set_input(&self, callback: InputCallback) -> bool {
        write(&self.input).replace(Arc::from(callback)).is_some()
    }

    /// Installs the link state subscriber and returns true if one was
    /// replaced.
    pub fn set_link_state(&self, callback: LinkStateCallback) -> bool {
        write(&self.link_state).replace(Arc::from(callback)).is_some()
    }

    pub fn has_input(&self) -> bool {
        read(&self.input).is_some()
    }

    pub fn has_link_state(&self) -> bool {
        read(&self.link_state).is_some()
    }

    /// Removes both subscribers.
    pub fn clear(&self) {
        write(&self.input).take();
        write(&self.link_state).take();
    }

    /// Hands a received frame to the input subscriber. Without one the frame
    /// is dropped.
    pub fn input(&self, buffer: PacketBuffer) -> Result<()> {
        let callback = read(&self.input).clone();
        match callback {
            Some(callback) => {
                callback(buffer);
                Ok(())
            }
            None => {
                debug!("No input subscriber, dropping {:?}.", buffer);
                Err(Error::NoOp)
            }
        }
    }

    /// Reports a link change to the link state subscriber.
    pub fn link_state(&self, up: bool) -> Result<()> {
        let callback = read(&self.link_state).clone();
        match callback {
            Some(callback) => {
                callback(up);
                Ok(())
            }
            None => Err(Error::NoOp),
        }
    }
}

/// A MAC device which receives every frame it sends.
///
/// Frames are delivered back to the input subscriber on the sending thread,
/// before `link_out` returns.
pub struct Loopback {
    subscriptions: Subscriptions,
    eth_addr: EthernetAddress,
    mtu: u32,
    powered: AtomicBool,
    sent: AtomicUsize,
}

impl Loopback {
    pub fn new(eth_addr: EthernetAddress, mtu: u32) -> Loopback {
        Loopback {
            subscriptions: Subscriptions::new(),
            eth_addr,
            mtu,
            powered: AtomicBool::new(false),
            sent: AtomicUsize::new(0),
        }
    }

    /// Simulates the link going up or down. Ignored while powered down.
    pub fn set_link(&self, up: bool) {
        if !self.powered.load(Ordering::SeqCst) {
            debug!("Loopback is powered down, ignoring link change.");
            return;
        }

        let _ = self.subscriptions.link_state(up);
    }

    /// Returns the number of frames sent successfully.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }
}

impl MacDevice for Loopback {
    fn link_out(&self, buffer: PacketBuffer) -> bool {
        if !self.powered.load(Ordering::SeqCst) {
            return false;
        }

        self.sent.fetch_add(1, Ordering::SeqCst);
        let _ = self.subscriptions.input(buffer);
        true
    }

    fn set_input_callback(&self, callback: InputCallback) {
        self.subscriptions.set_input(callback);
    }

    fn set_link_state_callback(&self, callback: LinkStateCallback) {
        self.subscriptions.set_link_state(callback);
    }

    fn hwaddr_len(&self) -> usize {
        EthernetAddress::LEN
    }

    fn hwaddr(&self, addr: &mut [u8]) {
        addr[.. EthernetAddress::LEN].copy_from_slice(self.eth_addr.as_bytes());
    }

    fn mtu(&self) -> u32 {
        self.mtu
    }

    fn ifname(&self) -> [char; 2] {
        ['l', 'o']
    }

    fn power_up(&self) -> bool {
        if !self.powered.swap(true, Ordering::SeqCst) {
            let _ = self.subscriptions.link_state(true);
        }
        true
    }

    fn power_down(&self) -> bool {
        if self.powered.swap(false, Ordering::SeqCst) {
            let _ = self.subscriptions.link_state(false);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net::buffer::Pool;
    use std::sync::Mutex;

    #[test]
    fn test_resubscribe_overwrites() {
        let subscriptions = Subscriptions::new();
        let calls = Arc::new(Mutex::new(vec![]));

        let first = calls.clone();
        assert!(!subscriptions.set_link_state(Box::new(move |up| {
            first.lock().unwrap().push(("first", up));
        })));

        let second = calls.clone();
        assert!(subscriptions.set_link_state(Box::new(move |up| {
            second.lock().unwrap().push(("second", up));
        })));

        subscriptions.link_state(true).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![("second", true)]);
    }

    #[test]
    fn test_input_without_subscriber_drops() {
        let pool = Pool::new(1);
        let subscriptions = Subscriptions::new();

        assert_matches!(subscriptions.input(pool.alloc(4).unwrap()), Err(Error::NoOp));
        assert_eq!(pool.freed(), 1);
    }

    #[test]
    fn test_subscriber_can_resubscribe() {
        let subscriptions = Arc::new(Subscriptions::new());
        let inner = subscriptions.clone();
        subscriptions.set_link_state(Box::new(move |_| {
            inner.set_link_state(Box::new(|_| {}));
        }));

        subscriptions.link_state(true).unwrap();
        assert!(subscriptions.has_link_state());

        subscriptions.clear();
        assert!(!subscriptions.has_link_state());
        assert!(!subscriptions.has_input());
    }

    #[test]
    fn test_loopback_echoes_frames() {
        let pool = Pool::new(2);
        let loopback = Loopback::new(EthernetAddress::new([0x06, 0, 0, 0, 0, 1]), 1500);
        let received = Arc::new(Mutex::new(vec![]));

        let sink = received.clone();
        loopback.set_input_callback(Box::new(move |buffer| {
            sink.lock().unwrap().push(buffer.into_vec());
        }));

        assert!(!loopback.link_out(pool.alloc_from(&[1]).unwrap()));
        assert!(loopback.power_up());
        assert!(loopback.link_out(pool.alloc_from(&[2]).unwrap()));

        assert_eq!(*received.lock().unwrap(), vec![vec![2]]);
        assert_eq!(loopback.sent(), 1);
        assert_eq!(pool.freed(), 2);
    }

    #[test]
    fn test_loopback_reports_link() {
        let loopback = Loopback::new(EthernetAddress::new([0x06, 0, 0, 0, 0, 1]), 1500);
        let states = Arc::new(Mutex::new(vec![]));

        let sink = states.clone();
        loopback.set_link_state_callback(Box::new(move |up| {
            sink.lock().unwrap().push(up);
        }));

        loopback.set_link(true);
        loopback.power_up();
        loopback.power_up();
        loopback.set_link(false);
        loopback.power_down();

        assert_eq!(*states.lock().unwrap(), vec![true, false, false]);
        assert!(!loopback.is_powered());
    }
}
