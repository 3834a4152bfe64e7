//! Observed addresses and IPv6 address synthesis
//!
//! Every address that enters the pipeline carries its [`Family`] explicitly,
//! so later stages never re-derive it from the shape of the value.
//!
//! When the gateway only hands out a routed prefix, the full IPv6 address of
//! the target host is rebuilt from that prefix plus the host's locally known
//! interface identifier (see [`synthesize`]).

use crate::error::{Error, Result};
use crate::traits::RecordType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of an observed address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl Family {
    /// Numeric IP version (4 or 6)
    pub fn version(self) -> u8 {
        match self {
            Family::V4 => 4,
            Family::V6 => 6,
        }
    }

    /// DNS record type holding addresses of this family
    pub fn record_type(self) -> RecordType {
        match self {
            Family::V4 => RecordType::A,
            Family::V6 => RecordType::Aaaa,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.version())
    }
}

/// An address reported by the gateway or synthesized from its prefix
///
/// Immutable once produced. The family tag is fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservedAddress {
    family: Family,
    ip: IpAddr,
}

impl ObservedAddress {
    /// An observed IPv4 address
    pub fn v4(ip: Ipv4Addr) -> Self {
        Self {
            family: Family::V4,
            ip: IpAddr::V4(ip),
        }
    }

    /// An observed IPv6 address
    pub fn v6(ip: Ipv6Addr) -> Self {
        Self {
            family: Family::V6,
            ip: IpAddr::V6(ip),
        }
    }

    /// The family this address belongs to
    pub fn family(&self) -> Family {
        self.family
    }

    /// The address value
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl From<IpAddr> for ObservedAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::v4(v4),
            IpAddr::V6(v6) => Self::v6(v6),
        }
    }
}

impl fmt::Display for ObservedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ip.fmt(f)
    }
}

/// A routed IPv6 prefix: base address plus mask length (0..=128)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Prefix {
    base: Ipv6Addr,
    len: u8,
}

impl Ipv6Prefix {
    /// Create a prefix, rejecting mask lengths above 128
    pub fn new(base: Ipv6Addr, len: u8) -> Result<Self> {
        if len > 128 {
            return Err(Error::synthesis(format!(
                "IPv6 prefix length {} exceeds 128",
                len
            )));
        }

        Ok(Self { base, len })
    }

    /// Base address as reported (host bits are not cleared)
    pub fn base(&self) -> Ipv6Addr {
        self.base
    }

    /// Mask length in bits
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Mask with ones in the network portion
    fn network_mask(&self) -> u128 {
        match self.len {
            0 => 0,
            len => u128::MAX << (128 - u32::from(len)),
        }
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.len)
    }
}

impl FromStr for Ipv6Prefix {
    type Err = Error;

    /// Parse CIDR notation, e.g. `2001:db8:1234::/56`
    fn from_str(s: &str) -> Result<Self> {
        let (base, len) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::synthesis(format!("Missing prefix length in '{}'", s)))?;

        let base: Ipv6Addr = base
            .parse()
            .map_err(|e| Error::synthesis(format!("Invalid IPv6 prefix '{}': {}", s, e)))?;
        let len: u8 = len
            .parse()
            .map_err(|e| Error::synthesis(format!("Invalid prefix length in '{}': {}", s, e)))?;

        Self::new(base, len)
    }
}

/// The host portion of the target's IPv6 address, known locally
///
/// Supplied once at startup. Only the bits outside the routed prefix are
/// ever used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceId(u128);

impl InterfaceId {
    /// Raw 128-bit value
    pub fn bits(&self) -> u128 {
        self.0
    }
}

impl From<Ipv6Addr> for InterfaceId {
    fn from(addr: Ipv6Addr) -> Self {
        Self(u128::from(addr))
    }
}

impl FromStr for InterfaceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<Ipv6Addr>()
            .map(Self::from)
            .map_err(|e| Error::config(format!("Invalid local IPv6 address '{}': {}", s, e)))
    }
}

/// Merge a routed prefix with a local interface identifier
///
/// Bit `i` (0 = most significant) of the result comes from the prefix when
/// `i < prefix.len()`, and from the interface identifier otherwise.
pub fn synthesize(prefix: &Ipv6Prefix, interface_id: &InterfaceId) -> Ipv6Addr {
    let network = prefix.network_mask();
    let merged = (u128::from(prefix.base()) & network) | (interface_id.bits() & !network);
    Ipv6Addr::from(merged)
}
