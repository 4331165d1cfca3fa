use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::result::Result as StdResult;
use std::str::FromStr;

/// [IPv4 address](https://en.wikipedia.org/wiki/IPv4) in network byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; 4]);

impl Address {
    /// Creates an IPv4 address from a network byte order buffer.
    pub fn new(addr: [u8; 4]) -> Address {
        Address(addr)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl FromStr for Address {
    type Err = ();

    /// Parses an IPv4 address from an A.B.C.D style string.
    fn from_str(addr: &str) -> StdResult<Address, Self::Err> {
        let bytes = addr.split('.')
            .map(|token| token.parse::<u8>())
            .collect::<StdResult<Vec<_>, _>>()
            .map_err(|_| ())?;

        if bytes.len() != 4 {
            return Err(());
        }

        let mut ipv4 = [0; 4];
        ipv4.copy_from_slice(&bytes);
        Ok(Address(ipv4))
    }
}
