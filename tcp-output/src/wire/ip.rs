//! Addresses of the network layer below TCP.
//!
//! Only as much as the output engine needs: an address to look up a route for and the header
//! length of the family, which is subtracted from the MTU to get at the segment size.
use core::fmt;

/// The length of an IPv4 header without options.
pub const IPV4_HEADER_LEN: usize = 20;

/// The length of the fixed IPv6 header.
pub const IPV6_HEADER_LEN: usize = 40;

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Ipv4Address(pub [u8; 4]);

/// A sixteen-octet IPv6 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Ipv6Address(pub [u8; 16]);

/// An internetworking address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Address {
    /// An IPv4 address.
    Ipv4(Ipv4Address),

    /// An IPv6 address.
    Ipv6(Ipv6Address),
}

/// A CIDR block, an address and a prefix length.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Cidr {
    address: Address,
    prefix_len: u8,
}

/// The local and remote address of a connection.
///
/// The family is fixed when the connection is created. Everything that differs between IPv4 and
/// IPv6 on the output path is answered by this type.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Endpoints {
    /// An IPv4 association.
    Ipv4 {
        /// Our address.
        local: Ipv4Address,
        /// The peer address.
        remote: Ipv4Address,
    },
    /// An IPv6 association.
    Ipv6 {
        /// Our address.
        local: Ipv6Address,
        /// The peer address.
        remote: Ipv6Address,
    },
}

impl Ipv4Address {
    /// The unspecified address `0.0.0.0`.
    pub const UNSPECIFIED: Ipv4Address = Ipv4Address([0; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Ipv4Address {
        Ipv4Address([a0, a1, a2, a3])
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is in `127.0.0.0/8`.
    pub fn is_loopback(&self) -> bool {
        self.0[0] == 127
    }
}

impl Ipv6Address {
    /// The loopback address `::1`.
    pub const LOOPBACK: Ipv6Address = Ipv6Address([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

    /// Construct an IPv6 address from its eight 16-bit groups.
    pub fn new(
        a0: u16, a1: u16, a2: u16, a3: u16,
        a4: u16, a5: u16, a6: u16, a7: u16,
    ) -> Ipv6Address {
        let mut bytes = [0; 16];
        for (i, group) in [a0, a1, a2, a3, a4, a5, a6, a7].iter().enumerate() {
            bytes[2*i] = (group >> 8) as u8;
            bytes[2*i + 1] = *group as u8;
        }
        Ipv6Address(bytes)
    }

    /// Return an IPv6 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is `::1`.
    pub fn is_loopback(&self) -> bool {
        *self == Self::LOOPBACK
    }
}

impl Address {
    /// Create an address wrapping an IPv4 address with the given octets.
    pub const fn v4(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address::Ipv4(Ipv4Address::new(a0, a1, a2, a3))
    }

    /// Return an address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Ipv4(addr) => addr.as_bytes(),
            Address::Ipv6(addr) => addr.as_bytes(),
        }
    }

    /// Query whether the address refers to the local host.
    pub fn is_loopback(&self) -> bool {
        match self {
            Address::Ipv4(addr) => addr.is_loopback(),
            Address::Ipv6(addr) => addr.is_loopback(),
        }
    }
}

impl Cidr {
    /// Create a CIDR block from the given address and prefix length.
    ///
    /// Returns `None` if the prefix is longer than the address.
    pub fn new(address: Address, prefix_len: u8) -> Option<Cidr> {
        if usize::from(prefix_len) > address.as_bytes().len() * 8 {
            return None;
        }
        Some(Cidr { address, prefix_len })
    }

    /// Return the IP address of this CIDR block.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Return the prefix length of this CIDR block.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Query whether the block contains an address of the same family.
    pub fn contains(&self, addr: Address) -> bool {
        match (self.address, addr) {
            (Address::Ipv4(_), Address::Ipv4(_)) | (Address::Ipv6(_), Address::Ipv6(_)) => (),
            _ => return false,
        }

        let ours = self.address.as_bytes();
        let theirs = addr.as_bytes();
        let full = usize::from(self.prefix_len / 8);
        if ours[..full] != theirs[..full] {
            return false;
        }

        let rest = self.prefix_len % 8;
        if rest == 0 {
            return true;
        }
        let mask = !(0xffu8 >> rest);
        ours[full] & mask == theirs[full] & mask
    }
}

impl Endpoints {
    /// The address the segments are destined to.
    pub fn remote(&self) -> Address {
        match self {
            Endpoints::Ipv4 { remote, .. } => Address::Ipv4(*remote),
            Endpoints::Ipv6 { remote, .. } => Address::Ipv6(*remote),
        }
    }

    /// Our own address.
    pub fn local(&self) -> Address {
        match self {
            Endpoints::Ipv4 { local, .. } => Address::Ipv4(*local),
            Endpoints::Ipv6 { local, .. } => Address::Ipv6(*local),
        }
    }

    /// The length of the network header preceding each segment, without options.
    pub fn header_len(&self) -> usize {
        match self {
            Endpoints::Ipv4 { .. } => IPV4_HEADER_LEN,
            Endpoints::Ipv6 { .. } => IPV6_HEADER_LEN,
        }
    }
}

impl From<Ipv4Address> for Address {
    fn from(addr: Ipv4Address) -> Self {
        Address::Ipv4(addr)
    }
}

impl From<Ipv6Address> for Address {
    fn from(addr: Ipv6Address) -> Self {
        Address::Ipv6(addr)
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, pair) in self.0.chunks(2).enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:x}", u16::from(pair[0]) << 8 | u16::from(pair[1]))?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Ipv4(addr) => write!(f, "{}", addr),
            Address::Ipv6(addr) => write!(f, "{}", addr),
        }
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}
