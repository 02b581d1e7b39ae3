//! IPv4 address blocks.
//!
//! Example: "10.0.0.0/16"  =>  Cidr { base: 10.0.0.0, prefix: 16 }
//!
//! Ordering is derived so blocks can key a BTreeSet/Map; it sorts by base address.

use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Smallest subnet the platform accepts.
pub const MAX_SUBNET_PREFIX: u8 = 28;

/// Network blocks must lie between /16 and /28.
pub const MIN_VPC_PREFIX: u8 = 16;
pub const MAX_VPC_PREFIX: u8 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    base: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    pub fn new(base: Ipv4Addr, prefix: u8) -> Result<Self, BuildError> {
        let invalid = |reason: String| BuildError::InvalidCidr {
            value: format!("{}/{}", base, prefix),
            reason,
        };
        if prefix > 32 {
            return Err(invalid(format!("prefix /{} exceeds 32", prefix)));
        }
        if u32::from(base) & !netmask(prefix) != 0 {
            return Err(invalid(format!(
                "host bits are set (network address is {})",
                Ipv4Addr::from(u32::from(base) & netmask(prefix))
            )));
        }
        Ok(Self { base, prefix })
    }

    pub fn base(&self) -> Ipv4Addr {
        self.base
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    /// Check the block is usable as a whole network address space.
    pub fn check_network_block(&self) -> Result<(), BuildError> {
        if !(MIN_VPC_PREFIX..=MAX_VPC_PREFIX).contains(&self.prefix) {
            return Err(BuildError::InvalidCidr {
                value: self.to_string(),
                reason: format!(
                    "network prefix must lie between /{} and /{}",
                    MIN_VPC_PREFIX, MAX_VPC_PREFIX
                ),
            });
        }
        Ok(())
    }

    /// Carve `count` contiguous `/mask` blocks from the start of this block.
    pub fn subdivide(&self, mask: u8, count: usize) -> Result<Vec<Cidr>, BuildError> {
        if mask < self.prefix || mask > MAX_SUBNET_PREFIX {
            return Err(BuildError::InvalidMask {
                block: self.to_string(),
                mask,
                reason: format!("must lie between /{} and /{}", self.prefix, MAX_SUBNET_PREFIX),
            });
        }

        let step = 1u64 << (32 - u32::from(mask));
        let needed = step * count as u64;
        if needed > self.size() {
            return Err(BuildError::SubnetsDoNotFit {
                block: self.to_string(),
                mask,
                count,
                needed,
                available: self.size(),
            });
        }

        let start = u64::from(u32::from(self.base));
        (0..count as u64)
            .map(|i| {
                // Fits in u32: start + needed <= start + size <= 2^32.
                let addr = (start + i * step) as u32;
                Cidr::new(Ipv4Addr::from(addr), mask)
            })
            .collect()
    }
}

fn netmask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p => u32::MAX << (32 - u32::from(p)),
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.prefix)
    }
}

impl FromStr for Cidr {
    type Err = BuildError;

    /// Parse "10.0.0.0/16". The base must be the network address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| BuildError::InvalidCidr {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected <address>/<prefix>"))?;
        let base: Ipv4Addr = addr
            .parse()
            .map_err(|_| invalid("address is not dotted-quad IPv4"))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| invalid("prefix is not a number"))?;
        Cidr::new(base, prefix)
    }
}

impl TryFrom<String> for Cidr {
    type Error = BuildError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cidr> for String {
    fn from(c: Cidr) -> Self {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cidr(s: &str) -> Cidr {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_displays() {
        let c = cidr("10.0.0.0/16");
        assert_eq!(c.base(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(c.prefix(), 16);
        assert_eq!(c.size(), 65_536);
        assert_eq!(c.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn rejects_malformed_blocks() {
        for bad in ["10.0.0.0", "10.0.0/16", "10.0.0.0/33", "10.0.0.0/x", "10.0.0.1/16"] {
            let err = bad.parse::<Cidr>().unwrap_err();
            assert!(
                matches!(err, BuildError::InvalidCidr { .. }),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn subdivide_packs_from_base() {
        let blocks = cidr("10.0.0.0/16").subdivide(27, 4).unwrap();
        let shown: Vec<String> = blocks.iter().map(ToString::to_string).collect();
        assert_eq!(
            shown,
            vec!["10.0.0.0/27", "10.0.0.32/27", "10.0.0.64/27", "10.0.0.96/27"]
        );
    }

    #[test]
    fn subdivide_rejects_overflow() {
        let err = cidr("10.0.0.0/26").subdivide(27, 4).unwrap_err();
        match err {
            BuildError::SubnetsDoNotFit {
                needed, available, ..
            } => {
                assert_eq!(needed, 128);
                assert_eq!(available, 64);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn subdivide_rejects_mask_outside_block() {
        assert!(matches!(
            cidr("10.0.0.0/16").subdivide(12, 1),
            Err(BuildError::InvalidMask { mask: 12, .. })
        ));
        assert!(matches!(
            cidr("10.0.0.0/16").subdivide(29, 1),
            Err(BuildError::InvalidMask { mask: 29, .. })
        ));
    }

    #[test]
    fn network_block_prefix_range() {
        assert!(cidr("10.0.0.0/16").check_network_block().is_ok());
        assert!(cidr("10.0.0.0/28").check_network_block().is_ok());
        for bad in ["10.0.0.0/8", "10.0.0.0/15", "10.0.0.0/29"] {
            assert!(
                matches!(
                    cidr(bad).check_network_block(),
                    Err(BuildError::InvalidCidr { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn deserializes_from_string() {
        let c: Cidr = serde_json::from_str("\"192.168.0.0/20\"").unwrap();
        assert_eq!(c, cidr("192.168.0.0/20"));
        assert!(serde_json::from_str::<Cidr>("\"192.168.0.1/20\"").is_err());
    }
}
