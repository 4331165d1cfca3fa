#![allow(dead_code)]

use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
};

use env_logger;

use emacnet::net::adapter;
use emacnet::net::buffer::{
    PacketBuffer,
    Pool,
    SendError,
    SendResult,
};
use emacnet::net::mac::{
    InputCallback,
    LinkStateCallback,
    MacDevice,
    Subscriptions,
};
use emacnet::net::marshal::{
    Config,
    Executor,
    Handle,
};
use emacnet::net::netif::Interface;
use emacnet::net::repr::{
    EthernetFrame,
    Ipv4Address,
};
use emacnet::net::stack::{
    Host,
    Stack,
};
use emacnet::{
    Error,
    Result,
};

pub const HWADDR: [u8; 6] = [0x06, 0x00, 0x00, 0x00, 0x00, 0x01];

pub const MTU: u32 = 1500;

pub type Context = Handle<Host<MockStack>>;

/// A MAC device which records everything the adapter asks of it. Link
/// changes and received frames are injected by the test.
pub struct MockMac {
    subscriptions: Subscriptions,
    hwaddr: Vec<u8>,
    power_up_ok: bool,
    send_ok: AtomicBool,
    sent: Mutex<Vec<Vec<u8>>>,
    link_outs: AtomicUsize,
    power_ups: AtomicUsize,
    power_downs: AtomicUsize,
}

impl MockMac {
    pub fn new() -> MockMac {
        MockMac::with_hwaddr(&HWADDR)
    }

    pub fn with_hwaddr(hwaddr: &[u8]) -> MockMac {
        MockMac {
            subscriptions: Subscriptions::new(),
            hwaddr: hwaddr.to_vec(),
            power_up_ok: true,
            send_ok: AtomicBool::new(true),
            sent: Mutex::new(vec![]),
            link_outs: AtomicUsize::new(0),
            power_ups: AtomicUsize::new(0),
            power_downs: AtomicUsize::new(0),
        }
    }

    /// A device which refuses to power up.
    pub fn broken() -> MockMac {
        MockMac {
            power_up_ok: false,
            ..MockMac::new()
        }
    }

    pub fn set_send_ok(&self, ok: bool) {
        self.send_ok.store(ok, Ordering::SeqCst);
    }

    /// Returns copies of every frame handed to `link_out`.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn link_outs(&self) -> usize {
        self.link_outs.load(Ordering::SeqCst)
    }

    pub fn power_ups(&self) -> usize {
        self.power_ups.load(Ordering::SeqCst)
    }

    pub fn power_downs(&self) -> usize {
        self.power_downs.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions.has_input() && self.subscriptions.has_link_state()
    }

    /// Simulates the hardware receiving a frame, on the calling thread.
    pub fn receive(&self, buffer: PacketBuffer) -> Result<()> {
        self.subscriptions.input(buffer)
    }

    /// Simulates the hardware reporting a link change, on the calling thread.
    pub fn link(&self, up: bool) -> Result<()> {
        self.subscriptions.link_state(up)
    }
}

impl MacDevice for MockMac {
    fn link_out(&self, buffer: PacketBuffer) -> bool {
        self.link_outs.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(buffer.as_ref().to_vec());
        buffer.free();
        self.send_ok.load(Ordering::SeqCst)
    }

    fn set_input_callback(&self, callback: InputCallback) {
        self.subscriptions.set_input(callback);
    }

    fn set_link_state_callback(&self, callback: LinkStateCallback) {
        self.subscriptions.set_link_state(callback);
    }

    fn hwaddr_len(&self) -> usize {
        self.hwaddr.len()
    }

    fn hwaddr(&self, addr: &mut [u8]) {
        addr[.. self.hwaddr.len()].copy_from_slice(&self.hwaddr);
    }

    fn mtu(&self) -> u32 {
        MTU
    }

    fn ifname(&self) -> [char; 2] {
        ['e', 'n']
    }

    fn power_up(&self) -> bool {
        self.power_ups.fetch_add(1, Ordering::SeqCst);
        self.power_up_ok
    }

    fn power_down(&self) -> bool {
        self.power_downs.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// A stack which keeps every frame at least a header long and rejects the
/// rest. Output goes straight to the link layer.
#[derive(Debug, Default)]
pub struct MockStack {
    pub kept: Vec<PacketBuffer>,
    pub outputs: usize,
}

impl Stack for MockStack {
    fn input(&mut self, _: &mut Interface, buffer: PacketBuffer) -> SendResult {
        if buffer.len() < EthernetFrame::<&[u8]>::HEADER_LEN {
            return Err(SendError::Returned(Error::Malformed, buffer));
        }

        self.kept.push(buffer);
        Ok(())
    }

    fn output(
        &mut self,
        interface: &mut Interface,
        buffer: PacketBuffer,
        _: Ipv4Address,
    ) -> SendResult {
        self.outputs += 1;
        interface.link_output(buffer)?;
        Ok(())
    }
}

pub fn init_logger() {
    let _ = env_logger::try_init();
}

pub fn dst() -> Ipv4Address {
    Ipv4Address::new([10, 0, 0, 1])
}

/// Returns a buffer holding a header sized frame, which `MockStack` keeps.
pub fn valid_frame(pool: &Pool) -> PacketBuffer {
    pool.alloc(EthernetFrame::<&[u8]>::buffer_len(32)).unwrap()
}

/// Returns a buffer too short to be a frame, which `MockStack` rejects.
pub fn malformed_frame(pool: &Pool) -> PacketBuffer {
    pool.alloc(4).unwrap()
}

/// Starts a stack context with a `MockStack` and initializes an interface on
/// top of mac inside it.
pub fn bringup_with(mac: Arc<MockMac>, config: &Config) -> (Executor<Host<MockStack>>, Result<u8>) {
    init_logger();

    let executor = Executor::spawn(config, Host::new(MockStack::default())).unwrap();
    let context = executor.handle();
    let mac: Arc<dyn MacDevice> = mac;
    let num = executor
        .handle()
        .call(move |host: &mut Host<MockStack>| {
            host.add_interface(|interface| adapter::init(interface, mac, &context))
        })
        .unwrap();

    (executor, num)
}

pub fn bringup(mac: Arc<MockMac>) -> (Executor<Host<MockStack>>, u8) {
    let (executor, num) = bringup_with(mac, &Config::default());
    (executor, num.unwrap())
}

/// Waits for everything posted to the context so far to run.
pub fn sync(context: &Context) {
    context.call(|_| ()).unwrap();
}

pub fn is_up(context: &Context, num: u8) -> bool {
    context
        .call(move |host: &mut Host<MockStack>| host.interface(num).unwrap().is_up())
        .unwrap()
}

/// Counts up/down transitions of interface num from here on.
pub fn count_transitions(context: &Context, num: u8) -> Arc<AtomicUsize> {
    let transitions = Arc::new(AtomicUsize::new(0));
    let counter = transitions.clone();
    context
        .call(move |host: &mut Host<MockStack>| {
            host.interface_mut(num)
                .unwrap()
                .set_status_callback(Box::new(move |_: &Interface| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
        })
        .unwrap();
    transitions
}
