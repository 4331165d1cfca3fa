#[cfg(test)]
#[macro_use]
extern crate assert_matches;
#[macro_use]
extern crate bitflags;
extern crate byteorder;
extern crate libc;
#[macro_use]
extern crate log;

pub mod net;

#[cfg(target_os = "linux")]
pub mod linux;

use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};

#[derive(Debug)]
pub enum Error {
    /// Indicates the MAC device could not be powered up.
    DeviceInitFailed,
    /// Indicates a hardware address longer than an interface can hold.
    AddressTooLong(usize),
    /// Indicates an attempt to send through an interface which is not up.
    LinkDown,
    /// Indicates the MAC device failed to transmit a frame.
    TransmitFailed,
    /// Indicates the stack refused an inbound frame.
    InputRejected,
    /// Indicates an error where an address could not be resolved.
    Address,
    /// Indicates an error where a buffer, pool, queue, etc. is full or empty.
    Exhausted,
    /// Indicates an error where a packet or frame is malformed.
    Malformed,
    /// Indicates a frame which is valid but not addressed to us.
    Ignored,
    /// Indicates an error where the operation was not performed.
    NoOp,
    /// Indicates the stack execution context is no longer running.
    ContextClosed,
    /// Indicates a blocking call issued from inside the stack execution
    /// context, which would wait on itself.
    WouldDeadlock,
    /// Indicates a generic IO error.
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Error::DeviceInitFailed => write!(f, "MAC device failed to power up"),
            Error::AddressTooLong(len) => write!(f, "hardware address of {} bytes is too long", len),
            Error::LinkDown => write!(f, "link is down"),
            Error::TransmitFailed => write!(f, "MAC device failed to transmit"),
            Error::InputRejected => write!(f, "stack rejected inbound frame"),
            Error::Address => write!(f, "address could not be resolved"),
            Error::Exhausted => write!(f, "resource exhausted"),
            Error::Malformed => write!(f, "malformed frame"),
            Error::Ignored => write!(f, "frame ignored"),
            Error::NoOp => write!(f, "operation not performed"),
            Error::ContextClosed => write!(f, "stack context closed"),
            Error::WouldDeadlock => write!(f, "blocking call from inside the stack context"),
            Error::IO(ref err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
