//! Fuse bitmask.
//!
//! A fuse is a one-way permission bit. The low 16 bits are owner-controlled
//! (only the name's own controller may burn them), the high 16 bits are
//! parent-controlled (only the parent's controller may burn them, and only
//! until the child is emancipated with `PARENT_CANNOT_CONTROL`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::str::FromStr;

/// A set of burned fuses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fuses(u32);

impl Fuses {
    /// No fuses burned.
    pub const CAN_DO_EVERYTHING: Fuses = Fuses(0);

    // Owner-controlled
    pub const CANNOT_UNWRAP: Fuses = Fuses(1 << 0);
    pub const CANNOT_BURN_FUSES: Fuses = Fuses(1 << 1);
    pub const CANNOT_TRANSFER: Fuses = Fuses(1 << 2);
    pub const CANNOT_SET_RESOLVER: Fuses = Fuses(1 << 3);
    pub const CANNOT_SET_TTL: Fuses = Fuses(1 << 4);
    pub const CANNOT_CREATE_SUBDOMAIN: Fuses = Fuses(1 << 5);
    pub const CANNOT_APPROVE: Fuses = Fuses(1 << 6);

    // Parent-controlled
    pub const PARENT_CANNOT_CONTROL: Fuses = Fuses(1 << 16);
    /// Marks a name directly under the native zone. Set only by the native
    /// wrap path, never by a caller.
    pub const IS_NATIVE: Fuses = Fuses(1 << 17);
    pub const CAN_EXTEND_EXPIRY: Fuses = Fuses(1 << 18);

    /// Bits reserved for owner-controlled fuses.
    pub const OWNER_CONTROLLED: Fuses = Fuses(0x0000_FFFF);
    /// Bits reserved for parent-controlled fuses.
    pub const PARENT_CONTROLLED: Fuses = Fuses(0xFFFF_0000);
    /// Everything a caller may ever request.
    pub const SETTABLE: Fuses =
        Fuses(0x0000_FFFF | Self::PARENT_CANNOT_CONTROL.0 | Self::CAN_EXTEND_EXPIRY.0);

    /// Fuses that must both be present before any owner-controlled fuse.
    pub const EMANCIPATED_AND_LOCKED: Fuses =
        Fuses(Self::PARENT_CANNOT_CONTROL.0 | Self::CANNOT_UNWRAP.0);

    const NAMED: [(Fuses, &'static str); 10] = [
        (Self::CANNOT_UNWRAP, "CANNOT_UNWRAP"),
        (Self::CANNOT_BURN_FUSES, "CANNOT_BURN_FUSES"),
        (Self::CANNOT_TRANSFER, "CANNOT_TRANSFER"),
        (Self::CANNOT_SET_RESOLVER, "CANNOT_SET_RESOLVER"),
        (Self::CANNOT_SET_TTL, "CANNOT_SET_TTL"),
        (Self::CANNOT_CREATE_SUBDOMAIN, "CANNOT_CREATE_SUBDOMAIN"),
        (Self::CANNOT_APPROVE, "CANNOT_APPROVE"),
        (Self::PARENT_CANNOT_CONTROL, "PARENT_CANNOT_CONTROL"),
        (Self::IS_NATIVE, "IS_NATIVE"),
        (Self::CAN_EXTEND_EXPIRY, "CAN_EXTEND_EXPIRY"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Owner-controlled fuses travel as 16 bits on the wire.
    pub const fn from_owner_bits(bits: u16) -> Self {
        Self(bits as u32)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` are burned.
    pub const fn contains(self, other: Fuses) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one bit of `other` is burned.
    pub const fn intersects(self, other: Fuses) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Fuses) -> Fuses {
        Fuses(self.0 | other.0)
    }

    /// Keep only the bits in `mask`.
    pub const fn mask(self, mask: Fuses) -> Fuses {
        Fuses(self.0 & mask.0)
    }

    /// Whether every bit lies inside `allowed`.
    pub const fn is_subset_of(self, allowed: Fuses) -> bool {
        self.0 | allowed.0 == allowed.0
    }

    /// Names of the known fuses that are burned, low bit first.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(fuse, _)| self.contains(*fuse))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Bits that have no name.
    pub fn unnamed(self) -> Fuses {
        let named = Self::NAMED.iter().fold(0u32, |acc, (f, _)| acc | f.0);
        Fuses(self.0 & !named)
    }
}

impl BitOr for Fuses {
    type Output = Fuses;

    fn bitor(self, rhs: Fuses) -> Fuses {
        Fuses(self.0 | rhs.0)
    }
}

impl BitOrAssign for Fuses {
    fn bitor_assign(&mut self, rhs: Fuses) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Fuses {
    type Output = Fuses;

    fn bitand(self, rhs: Fuses) -> Fuses {
        Fuses(self.0 & rhs.0)
    }
}

impl Not for Fuses {
    type Output = Fuses;

    fn not(self) -> Fuses {
        Fuses(!self.0)
    }
}

impl fmt::Display for Fuses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("CAN_DO_EVERYTHING");
        }
        let mut parts: Vec<String> = self.names().iter().map(|s| s.to_string()).collect();
        let rest = self.unnamed();
        if !rest.is_empty() {
            parts.push(format!("0x{:08x}", rest.0));
        }
        f.write_str(&parts.join("|"))
    }
}

impl fmt::Debug for Fuses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fuses({})", self)
    }
}

impl FromStr for Fuses {
    type Err = Error;

    /// Parses `A|B|C` (fuse names) or a decimal / `0x` hex mask.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x") {
            return u32::from_str_radix(hex, 16)
                .map(Fuses)
                .map_err(|e| Error::InvalidName(format!("bad fuse mask '{}': {}", s, e)));
        }
        if let Ok(bits) = s.parse::<u32>() {
            return Ok(Fuses(bits));
        }
        s.split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(Fuses::CAN_DO_EVERYTHING, |acc, part| {
                if part == "CAN_DO_EVERYTHING" {
                    return Ok(acc);
                }
                Self::NAMED
                    .iter()
                    .find(|(_, name)| name.eq_ignore_ascii_case(part))
                    .map(|(fuse, _)| acc | *fuse)
                    .ok_or_else(|| Error::InvalidName(format!("unknown fuse '{}'", part)))
            })
    }
}
