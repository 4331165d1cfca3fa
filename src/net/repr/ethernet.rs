use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::result::Result as StdResult;
use std::str::FromStr;

use byteorder::{
    ByteOrder,
    NetworkEndian,
};

use {
    Error,
    Result,
};

/// [MAC address](https://en.wikipedia.org/wiki/MAC_address) in network byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; 6]);

impl Address {
    pub const BROADCAST: Address = Address([0xFF; 6]);

    pub const LEN: usize = 6;

    /// Creates a MAC address from a network byte order buffer.
    pub fn new(addr: [u8; 6]) -> Address {
        Address(addr)
    }

    /// Tries to create a MAC address from a network byte order slice.
    pub fn try_new(addr: &[u8]) -> Result<Address> {
        if addr.len() != Self::LEN {
            return Err(Error::Malformed);
        }

        let mut bytes = [0; 6];
        bytes.copy_from_slice(addr);
        Ok(Address(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_unicast(&self) -> bool {
        !(self.is_multicast() || self.is_broadcast())
    }

    /// Checks the group bit, which broadcast shares.
    pub fn is_multicast(&self) -> bool {
        (self.0[0] & 0b00000001) > 0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        )
    }
}

impl FromStr for Address {
    type Err = ();

    /// Parses a MAC address from an a:b:c:d:e:f style string.
    fn from_str(addr: &str) -> StdResult<Address, Self::Err> {
        let bytes = addr.split(':')
            .map(|token| u8::from_str_radix(token, 16))
            .collect::<StdResult<Vec<_>, _>>()
            .map_err(|_| ())?;

        Address::try_new(&bytes).map_err(|_| ())
    }
}

/// [https://en.wikipedia.org/wiki/EtherType](https://en.wikipedia.org/wiki/EtherType)
pub mod eth_types {
    pub const IPV4: u16 = 0x800;

    pub const ARP: u16 = 0x806;
}

mod fields {
    use std::ops::{
        Range,
        RangeFrom,
    };

    pub const DST_ADDR: Range<usize> = 0 .. 6;

    pub const SRC_ADDR: Range<usize> = 6 .. 12;

    pub const PAYLOAD_TYPE: Range<usize> = 12 .. 14;

    pub const PAYLOAD: RangeFrom<usize> = 14 ..;
}

/// View of a byte buffer as an Ethernet frame.
#[derive(Debug)]
pub struct Frame<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> Frame<T> {
    pub const HEADER_LEN: usize = 14;

    pub const MAX_FRAME_LEN: usize = 1518;

    /// Tries to create an Ethernet frame view over a byte buffer.
    pub fn try_new(buffer: T) -> Result<Frame<T>> {
        let len = buffer.as_ref().len();
        if len < Self::HEADER_LEN || len > Self::MAX_FRAME_LEN {
            Err(Error::Malformed)
        } else {
            Ok(Frame { buffer })
        }
    }

    /// Returns the length of an Ethernet frame with the specified payload size.
    pub fn buffer_len(payload_len: usize) -> usize {
        Self::HEADER_LEN + payload_len
    }

    pub fn dst_addr(&self) -> Address {
        let mut addr = [0; 6];
        addr.copy_from_slice(&self.buffer.as_ref()[fields::DST_ADDR]);
        Address(addr)
    }

    pub fn src_addr(&self) -> Address {
        let mut addr = [0; 6];
        addr.copy_from_slice(&self.buffer.as_ref()[fields::SRC_ADDR]);
        Address(addr)
    }

    pub fn payload_type(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[fields::PAYLOAD_TYPE])
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[fields::PAYLOAD]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Frame<T> {
    pub fn set_dst_addr(&mut self, addr: Address) {
        self.buffer.as_mut()[fields::DST_ADDR].copy_from_slice(addr.as_bytes());
    }

    pub fn set_src_addr(&mut self, addr: Address) {
        self.buffer.as_mut()[fields::SRC_ADDR].copy_from_slice(addr.as_bytes());
    }

    pub fn set_payload_type(&mut self, payload_type: u16) {
        NetworkEndian::write_u16(
            &mut self.buffer.as_mut()[fields::PAYLOAD_TYPE],
            payload_type,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_kinds() {
        assert!(Address::new([0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).is_unicast());
        assert!(Address::new([0x01, 0x00, 0x5E, 0x00, 0x00, 0x01]).is_multicast());
        assert!(Address::BROADCAST.is_broadcast());
        assert!(!Address::BROADCAST.is_unicast());
    }

    #[test]
    fn test_address_parse() {
        let addr: Address = "06:11:22:33:44:55".parse().unwrap();
        assert_eq!(addr, Address::new([0x06, 0x11, 0x22, 0x33, 0x44, 0x55]));
        assert_eq!(addr.to_string(), "06:11:22:33:44:55");
        assert_matches!("06:11:22:33:44".parse::<Address>(), Err(()));
        assert_matches!("06:11:22:33:44:zz".parse::<Address>(), Err(()));
    }

    #[test]
    fn test_frame_too_short() {
        assert_matches!(Frame::try_new(&[0u8; 13][..]), Err(Error::Malformed));
        assert_matches!(Frame::try_new(vec![0u8; 1519]), Err(Error::Malformed));
    }

    #[test]
    fn test_frame_fields() {
        let mut frame = Frame::try_new(vec![0u8; Frame::<&[u8]>::buffer_len(4)]).unwrap();
        frame.set_dst_addr(Address::BROADCAST);
        frame.set_src_addr(Address::new([0x06, 0, 0, 0, 0, 1]));
        frame.set_payload_type(eth_types::ARP);

        assert_eq!(frame.dst_addr(), Address::BROADCAST);
        assert_eq!(frame.src_addr(), Address::new([0x06, 0, 0, 0, 0, 1]));
        assert_eq!(frame.payload_type(), eth_types::ARP);
        assert_eq!(frame.payload().len(), 4);
    }
}
