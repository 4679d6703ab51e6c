//! KNX group and individual addresses
//!
//! Both address kinds are 16-bit values on the wire (high byte first).
//!
//! ```text
//! Group address       main/middle/sub    MMMM Miii ssss ssss  (5/3/8 bits)
//! Individual address  area.line.device   AAAA LLLL dddd dddd  (4/4/8 bits)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KnxError, Result};

/// Three-level group address (`main/middle/sub`), the multicast destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "AddressRepr", into = "String")]
pub struct GroupAddress(u16);

impl GroupAddress {
    /// Build from the three levels, checking each level's width
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self> {
        if main > 31 {
            return Err(KnxError::invalid_address(format!(
                "main group {main} out of range (0-31)"
            )));
        }
        if middle > 7 {
            return Err(KnxError::invalid_address(format!(
                "middle group {middle} out of range (0-7)"
            )));
        }
        Ok(Self(
            (u16::from(main) << 11) | (u16::from(middle) << 8) | u16::from(sub),
        ))
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn main(self) -> u8 {
        (self.0 >> 11) as u8 & 0x1F
    }

    pub const fn middle(self) -> u8 {
        (self.0 >> 8) as u8 & 0x07
    }

    pub const fn sub(self) -> u8 {
        self.0 as u8
    }
}

impl From<GroupAddress> for u16 {
    fn from(addr: GroupAddress) -> Self {
        addr.0
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

impl FromStr for GroupAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let levels = parse_levels(s, '/')?;
        Self::new(levels[0], levels[1], levels[2])
    }
}

impl TryFrom<AddressRepr> for GroupAddress {
    type Error = KnxError;

    fn try_from(repr: AddressRepr) -> Result<Self> {
        match repr {
            AddressRepr::Raw(raw) => Ok(Self::from_raw(raw)),
            AddressRepr::Text(s) => s.parse(),
        }
    }
}

impl From<GroupAddress> for String {
    fn from(addr: GroupAddress) -> Self {
        addr.to_string()
    }
}

/// Individual (physical) address (`area.line.device`), the unicast node identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "AddressRepr", into = "String")]
pub struct IndividualAddress(u16);

impl IndividualAddress {
    pub fn new(area: u8, line: u8, device: u8) -> Result<Self> {
        if area > 15 || line > 15 {
            return Err(KnxError::invalid_address(format!(
                "area/line {area}.{line} out of range (0-15)"
            )));
        }
        Ok(Self(
            (u16::from(area) << 12) | (u16::from(line) << 8) | u16::from(device),
        ))
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn area(self) -> u8 {
        (self.0 >> 12) as u8
    }

    pub const fn line(self) -> u8 {
        (self.0 >> 8) as u8 & 0x0F
    }

    pub const fn device(self) -> u8 {
        self.0 as u8
    }
}

impl From<IndividualAddress> for u16 {
    fn from(addr: IndividualAddress) -> Self {
        addr.0
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl FromStr for IndividualAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let levels = parse_levels(s, '.')?;
        Self::new(levels[0], levels[1], levels[2])
    }
}

impl TryFrom<AddressRepr> for IndividualAddress {
    type Error = KnxError;

    fn try_from(repr: AddressRepr) -> Result<Self> {
        match repr {
            AddressRepr::Raw(raw) => Ok(Self::from_raw(raw)),
            AddressRepr::Text(s) => s.parse(),
        }
    }
}

impl From<IndividualAddress> for String {
    fn from(addr: IndividualAddress) -> Self {
        addr.to_string()
    }
}

/// Serialized form: dotted/slashed text or the raw 16-bit value
#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Raw(u16),
    Text(String),
}

fn parse_levels(s: &str, separator: char) -> Result<[u8; 3]> {
    let parts: Vec<&str> = s.trim().split(separator).collect();
    if parts.len() != 3 {
        return Err(KnxError::invalid_address(format!(
            "'{s}': expected three levels separated by '{separator}'"
        )));
    }

    let mut levels = [0u8; 3];
    for (slot, part) in levels.iter_mut().zip(parts) {
        *slot = part
            .parse::<u8>()
            .map_err(|e| KnxError::invalid_address(format!("'{s}': {e}")))?;
    }
    Ok(levels)
}
