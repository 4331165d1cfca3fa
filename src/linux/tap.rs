use std;
use std::io;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use std::thread::{
    self,
    JoinHandle,
};

use libc;

use linux::libc as _libc;
use net::buffer::{
    PacketBuffer,
    Pool,
};
use net::mac::{
    InputCallback,
    LinkStateCallback,
    MacDevice,
    Subscriptions,
};
use net::repr::{
    EthernetAddress,
    EthernetFrame,
};
use {
    Error,
    Result,
};

/// How long the receive thread waits for a frame before checking whether it
/// should stop.
const POLL_TIMEOUT_MS: libc::c_int = 100;

struct Reader {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// [TAP interface](https://www.kernel.org/doc/Documentation/networking/tuntap.txt)
/// for sending and receiving raw ethernet frames.
///
/// Powering the device up starts a thread which reads frames from the TAP
/// into buffers allocated from the device's pool and hands them to the input
/// subscriber.
pub struct Tap {
    fd: libc::c_int,
    ifr_name: String,
    eth_addr: EthernetAddress,
    mtu: u32,
    pool: Pool,
    subscriptions: Arc<Subscriptions>,
    reader: Mutex<Option<Reader>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(err) => err.into_inner(),
    }
}

impl Tap {
    /// Creates or binds to an existing TAP interface with the specified name.
    ///
    /// Frames are sent with eth_addr as the device's hardware address and
    /// received into buffers from pool.
    pub fn new(ifr_name: &str, eth_addr: EthernetAddress, pool: Pool) -> Result<Tap> {
        let ifreq = _libc::c_ifreq::with_name(ifr_name).ok_or_else(|| {
            Error::IO(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("TAP name '{}' is too long", ifr_name),
            ))
        })?;

        let fd = unsafe {
            libc::open(
                "/dev/net/tun\0".as_ptr() as *const libc::c_char,
                libc::O_RDWR,
            )
        };

        if fd == -1 {
            return Err(Error::IO(io::Error::last_os_error()));
        }

        let mut _ifreq = ifreq;
        _ifreq.ifr_ifru.ifr_flags = _libc::IFF_TAP | _libc::IFF_NO_PI;
        if unsafe { libc::ioctl(fd, _libc::TUNSETIFF, &mut _ifreq as *mut _libc::c_ifreq) } == -1 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
            }
            return Err(Error::IO(err));
        }

        let mut tap = Tap {
            fd,
            ifr_name: ifr_name.to_string(),
            eth_addr,
            mtu: 0,
            pool,
            subscriptions: Arc::new(Subscriptions::new()),
            reader: Mutex::new(None),
        };

        let mut _ifreq = ifreq;
        Tap::inet_ioctl(_libc::SIOCGIFMTU, &mut _ifreq)?;
        tap.mtu = unsafe { _ifreq.ifr_ifru.ifr_mtu } as u32;

        debug!("Opened TAP {} with MTU {}.", tap.ifr_name, tap.mtu);
        Ok(tap)
    }

    pub fn name(&self) -> &str {
        &self.ifr_name
    }

    fn inet_ioctl(request: libc::c_ulong, ifreq: &mut _libc::c_ifreq) -> Result<()> {
        unsafe {
            let fd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);

            if fd == -1 {
                return Err(Error::IO(io::Error::last_os_error()));
            }

            if libc::ioctl(fd, request, ifreq as *mut _libc::c_ifreq) == -1 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(Error::IO(err));
            }

            libc::close(fd);
            Ok(())
        }
    }

    /// Stops the receive thread, if running. Returns false if it was not.
    fn stop_reader(&self) -> bool {
        let reader = lock(&self.reader).take();
        match reader {
            Some(reader) => {
                reader.running.store(false, Ordering::SeqCst);
                if reader.thread.join().is_err() {
                    warn!("Receive thread of TAP {} panicked.", self.ifr_name);
                }
                true
            }
            None => false,
        }
    }
}

fn read_frames(
    fd: libc::c_int,
    mut buf: Vec<u8>,
    pool: Pool,
    subscriptions: Arc<Subscriptions>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };

        let ready = unsafe { libc::poll(&mut pollfd, 1, POLL_TIMEOUT_MS) };
        if ready == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            warn!("Polling TAP failed with {}, stopping receive.", err);
            return;
        }

        if ready == 0 || pollfd.revents & libc::POLLIN == 0 {
            continue;
        }

        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n == -1 {
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => continue,
                _ => {
                    warn!("Reading TAP failed with {}, stopping receive.", err);
                    return;
                }
            }
        }

        match pool.alloc_from(&buf[.. n as usize]) {
            Ok(buffer) => {
                let _ = subscriptions.input(buffer);
            }
            Err(_) => debug!("No buffer for {} byte frame, dropping it.", n),
        }
    }
}

/// Checks that a write of len bytes which returned n went out in full.
fn wrote_all(n: libc::ssize_t, len: usize) -> bool {
    n >= 0 && n as usize == len
}

impl MacDevice for Tap {
    fn link_out(&self, buffer: PacketBuffer) -> bool {
        let buf = buffer.as_ref();
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n == -1 {
            debug!(
                "Writing to TAP {} failed with {}.",
                self.ifr_name,
                std::io::Error::last_os_error()
            );
            return false;
        }

        if !wrote_all(n, buf.len()) {
            debug!(
                "Short write to TAP {}, {} of {} bytes.",
                self.ifr_name,
                n,
                buf.len()
            );
            return false;
        }

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
        ['t', 'p']
    }

    fn power_up(&self) -> bool {
        {
            let mut reader = lock(&self.reader);
            if reader.is_some() {
                return true;
            }

            let running = Arc::new(AtomicBool::new(true));
            let buf = vec![0; EthernetFrame::<&[u8]>::buffer_len(self.mtu as usize)];
            let spawned = {
                let fd = self.fd;
                let pool = self.pool.clone();
                let subscriptions = self.subscriptions.clone();
                let running = running.clone();
                thread::Builder::new()
                    .name(format!("{}-rx", self.ifr_name))
                    .spawn(move || read_frames(fd, buf, pool, subscriptions, running))
            };

            match spawned {
                Ok(thread) => *reader = Some(Reader { running, thread }),
                Err(err) => {
                    warn!("Starting receive for TAP {} failed with {}.", self.ifr_name, err);
                    return false;
                }
            }
        }

        // The TAP carries no link of its own, it is up as long as we read.
        let _ = self.subscriptions.link_state(true);
        true
    }

    fn power_down(&self) -> bool {
        if self.stop_reader() {
            let _ = self.subscriptions.link_state(false);
        }
        true
    }
}

impl Drop for Tap {
    fn drop(&mut self) {
        self.stop_reader();
        unsafe {
            libc::close(self.fd);
        }
    }
}
