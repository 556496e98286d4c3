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

use crate::model::WorldStateError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How much a caller is trusted. Ordered, so a check is a comparison against the minimum needed.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Privilege {
    #[default]
    Player,
    Builder,
    Wizard,
}

impl Privilege {
    pub fn check(&self, required: Privilege, action: &str) -> Result<(), WorldStateError> {
        if *self < required {
            return Err(WorldStateError::PermissionDenied(format!(
                "{action} requires {required} privilege, caller has {self}"
            )));
        }
        Ok(())
    }
}
