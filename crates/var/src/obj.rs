// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::{E_INVARG, Error};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The "system" object. Every inheritance chain terminates here, and the alias registry hangs off
/// of it.
pub const SYSTEM_OBJECT: Obj = Obj::mk_id(0);

/// The root prototype most authored objects descend from.
pub const ROOT_PROTOTYPE: Obj = Obj::mk_id(1);

/// Holds snapshots of recycled objects.
pub const RECYCLER: Obj = Obj::mk_id(2);

/// Used throughout to refer to a missing object value.
pub const NOTHING: Obj = Obj::mk_id(-1);

/// A reference to an object: its unique, durable identity in the store.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Obj(i64);

impl Obj {
    pub const fn mk_id(id: i64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn to_literal(&self) -> String {
        format!("#{}", self.0)
    }

    pub fn is_sysobj(&self) -> bool {
        self.0 == 0
    }

    pub fn is_nothing(&self) -> bool {
        self.0 == -1
    }

    /// True if a parent walk stops at this identity rather than visiting it.
    pub fn terminates_chain(&self) -> bool {
        self.0 <= 0
    }

    /// One of the fixed identities written by bootstrap, which may never be recycled.
    pub fn is_bootstrap(&self) -> bool {
        (0..=2).contains(&self.0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Big-endian key bytes, so that iteration order over stored keys matches numeric order for
    /// non-negative identities.
    pub fn as_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = bytes.try_into().ok()?;
        Some(Self(i64::from_be_bytes(bytes)))
    }
}

impl Display for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for Obj {
    type Err = Error;

    /// Accepts both `#123` and `123`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix('#').unwrap_or(s.trim());
        digits
            .parse::<i64>()
            .map(Obj)
            .map_err(|_| E_INVARG.msg(format!("invalid object reference: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("#12", 12; "hash prefixed")]
    #[test_case("12", 12; "bare")]
    #[test_case(" #-1 ", -1; "nothing with whitespace")]
    fn test_parse(input: &str, expected: i64) {
        assert_eq!(input.parse::<Obj>().unwrap(), Obj::mk_id(expected));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("#abc".parse::<Obj>().is_err());
    }

    #[test]
    fn test_key_order_matches_numeric_order() {
        let a = Obj::mk_id(9).as_key();
        let b = Obj::mk_id(10).as_key();
        let c = Obj::mk_id(300).as_key();
        assert!(a < b && b < c);
        assert_eq!(Obj::from_key(&c), Some(Obj::mk_id(300)));
    }

    #[test]
    fn test_chain_terminators() {
        assert!(SYSTEM_OBJECT.terminates_chain());
        assert!(NOTHING.terminates_chain());
        assert!(!ROOT_PROTOTYPE.terminates_chain());
    }
}
