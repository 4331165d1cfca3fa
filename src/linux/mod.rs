//! Linux specific MAC devices.

pub mod libc;
pub mod tap;
