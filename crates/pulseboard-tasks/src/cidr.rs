//! CIDR range parsing and containment.

use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    #[error("CIDR range must be in format address/prefix: {0}")]
    Format(String),

    #[error("invalid CIDR address: {0}")]
    Address(String),

    #[error("invalid CIDR prefix length: {0}")]
    Prefix(String),
}

/// An address range such as `10.0.0.0/8` or `2001:db8::/32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Network address with host bits cleared
    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                u32::from(*ip) & v4_mask(self.prefix) == u32::from(net)
            }
            (IpAddr::V4(_), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => self.contains(&IpAddr::V4(v4)),
                None => false,
            },
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                u128::from(*ip) & v6_mask(self.prefix) == u128::from(net)
            }
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(|| CidrError::Format(s.to_string()))?;
        let addr: IpAddr = addr.parse().map_err(|_| CidrError::Address(addr.to_string()))?;
        let prefix: u8 = prefix.parse().map_err(|_| CidrError::Prefix(prefix.to_string()))?;

        let network = match addr {
            IpAddr::V4(ip) if prefix <= 32 => IpAddr::V4((u32::from(ip) & v4_mask(prefix)).into()),
            IpAddr::V6(ip) if prefix <= 128 => IpAddr::V6((u128::from(ip) & v6_mask(prefix)).into()),
            _ => return Err(CidrError::Prefix(prefix.to_string())),
        };
        Ok(Self { network, prefix })
    }
}

fn v4_mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}

fn v6_mask(prefix: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0)
}

/// True when any address lies in any range.
///
/// Malformed ranges and addresses are skipped; the first hit short-circuits.
pub fn any_contains<R, A>(ranges: &[R], addrs: &[A]) -> bool
where
    R: AsRef<str>,
    A: AsRef<str>,
{
    let addrs: Vec<IpAddr> = addrs.iter().filter_map(|a| a.as_ref().trim().parse().ok()).collect();
    ranges
        .iter()
        .filter_map(|r| r.as_ref().parse::<Cidr>().ok())
        .any(|cidr| addrs.iter().any(|addr| cidr.contains(addr)))
}
