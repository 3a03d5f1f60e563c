use core::fmt;
use core::str::FromStr;

use crate::parse::{read_group_addr, readaddr};
use crate::ParseError;

/// A KNX individual address packed as `area.line.device` (4/4/8 bits).
///
/// `0.0.0` is never assigned to a device; the router treats it as an unset
/// source and substitutes its own address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndividualAddress(u16);

impl IndividualAddress {
    pub const UNSET: Self = Self(0);

    /// Builds an address from its components, masking each to its field width.
    pub const fn new(area: u8, line: u8, device: u8) -> Self {
        Self((((area as u16) & 0x0F) << 12) | (((line as u16) & 0x0F) << 8) | device as u16)
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn area(self) -> u8 {
        (self.0 >> 12) as u8
    }

    pub const fn line(self) -> u8 {
        ((self.0 >> 8) & 0x0F) as u8
    }

    pub const fn device(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Returns the address `offset` positions after `self` in the raw
    /// numbering, or `None` on overflow.
    pub fn checked_add(self, offset: u16) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl FromStr for IndividualAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        readaddr(s)
    }
}

/// A KNX group address, displayed in three-level `main/middle/sub` form
/// (5/3/8 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupAddress(u16);

impl GroupAddress {
    /// `0/0/0`, received by every device.
    pub const BROADCAST: Self = Self(0);

    pub const fn new(main: u8, middle: u8, sub: u8) -> Self {
        Self((((main as u16) & 0x1F) << 11) | (((middle as u16) & 0x07) << 8) | sub as u16)
    }

    /// Builds an address from two-level `main/sub` notation (5/11 bits).
    pub const fn two_level(main: u8, sub: u16) -> Self {
        Self((((main as u16) & 0x1F) << 11) | (sub & 0x07FF))
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn main(self) -> u8 {
        (self.0 >> 11) as u8
    }

    pub const fn middle(self) -> u8 {
        ((self.0 >> 8) & 0x07) as u8
    }

    pub const fn sub(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub const fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

impl FromStr for GroupAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        read_group_addr(s)
    }
}

/// Destination of an L_Data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Destination {
    Individual(IndividualAddress),
    Group(GroupAddress),
}

impl Destination {
    pub const fn is_group(self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Individual(addr) => write!(f, "{addr}"),
            Self::Group(addr) => write!(f, "{addr}"),
        }
    }
}

impl From<IndividualAddress> for Destination {
    fn from(addr: IndividualAddress) -> Self {
        Self::Individual(addr)
    }
}

impl From<GroupAddress> for Destination {
    fn from(addr: GroupAddress) -> Self {
        Self::Group(addr)
    }
}
