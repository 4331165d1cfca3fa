//! Platform independent networking code.

pub mod adapter;
pub mod buffer;
pub mod ethernet;
pub mod mac;
pub mod marshal;
pub mod neighbor;
pub mod netif;
pub mod netstack;
pub mod repr;
pub mod stack;
pub mod time;
