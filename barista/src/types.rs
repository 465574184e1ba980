//! Common type definitions and the permission level bitmask.
//!
//! # ID Types
//!
//! Entity IDs are SQLite row ids wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`RoasterId`]: Roaster identifier
//!
//! # Permission Levels
//!
//! A user's permissions are a bitmask of independent flags ([`Level`]). Flags combine with `|`
//! and a user may hold several at once:
//!
//! ```ignore
//! use barista::types::Level;
//!
//! let level = Level::ADMIN | Level::MEMBER;
//! assert!(level.satisfies(Level::ADMIN));
//! assert!(!Level::MEMBER.satisfies(level));
//! ```
//!
//! [`Level::ANY`] is a sentinel with every bit set. As a requirement it means "any authenticated
//! user", regardless of which flags they hold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use utoipa::ToSchema;

// Type aliases for IDs
pub type UserId = i64;
pub type RoasterId = i64;

/// Permission bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = u8)]
pub struct Level(u8);

impl Level {
    pub const NONE: Level = Level(0);
    pub const DISABLED: Level = Level(1 << 0);
    pub const ADMIN: Level = Level(1 << 1);
    pub const MEMBER: Level = Level(1 << 2);
    pub const ANY: Level = Level(u8::MAX);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Level) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether a user holding `self` passes a gate that requires `required`.
    ///
    /// The user must hold all of the required bits. `ANY` is satisfied by every level.
    pub const fn satisfies(self, required: Level) -> bool {
        required.0 == Level::ANY.0 || self.contains(required)
    }

    pub const fn is_admin(self) -> bool {
        self.contains(Level::ADMIN)
    }

    pub const fn is_disabled(self) -> bool {
        self.contains(Level::DISABLED)
    }
}

impl BitOr for Level {
    type Output = Level;

    fn bitor(self, rhs: Level) -> Level {
        Level(self.0 | rhs.0)
    }
}

impl BitOrAssign for Level {
    fn bitor_assign(&mut self, rhs: Level) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Level {
    type Output = Level;

    fn bitand(self, rhs: Level) -> Level {
        Level(self.0 & rhs.0)
    }
}

impl From<u8> for Level {
    fn from(bits: u8) -> Self {
        Level(bits)
    }
}

// Stored as INTEGER; anything outside u8 is truncated to the known bits.
impl From<i64> for Level {
    fn from(bits: i64) -> Self {
        Level((bits & 0xFF) as u8)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Level::ANY {
            return write!(f, "Any");
        }

        let names: Vec<&str> = [(Level::DISABLED, "Disabled"), (Level::ADMIN, "Admin"), (Level::MEMBER, "Member")]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect();

        if names.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_distinct_powers_of_two() {
        assert_eq!(Level::DISABLED.bits(), 1);
        assert_eq!(Level::ADMIN.bits(), 2);
        assert_eq!(Level::MEMBER.bits(), 4);
        assert_eq!((Level::ADMIN | Level::MEMBER).bits(), 6);
    }

    #[test]
    fn test_any_is_satisfied_by_every_level() {
        assert!(Level::NONE.satisfies(Level::ANY));
        assert!(Level::MEMBER.satisfies(Level::ANY));
        assert!(Level::ADMIN.satisfies(Level::ANY));
    }

    #[test]
    fn test_composite_requirement_needs_all_bits() {
        let required = Level::ADMIN | Level::MEMBER;

        assert!((Level::ADMIN | Level::MEMBER).satisfies(required));
        assert!(!Level::ADMIN.satisfies(required));
        assert!(!Level::MEMBER.satisfies(required));
    }

    #[test]
    fn test_extra_bits_do_not_block_single_requirement() {
        assert!((Level::ADMIN | Level::MEMBER).satisfies(Level::MEMBER));
        assert!(!Level::MEMBER.satisfies(Level::ADMIN));
    }

    #[test]
    fn test_display() {
        assert_eq!(Level::ANY.to_string(), "Any");
        assert_eq!(Level::NONE.to_string(), "None");
        assert_eq!((Level::ADMIN | Level::MEMBER).to_string(), "Admin | Member");
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&(Level::ADMIN | Level::MEMBER)).unwrap();
        assert_eq!(json, "6");

        let level: Level = serde_json::from_str("4").unwrap();
        assert_eq!(level, Level::MEMBER);
    }
}
