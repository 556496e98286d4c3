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

//! The alias table: short names for well-known objects, persisted as a map on the system object
//! and mirrored in memory for `$name` lookups.

use protocosm_common::model::ObjectDocument;
use protocosm_var::{Obj, Var, v_map_iter, v_obj};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Property of the system object holding the alias map.
pub const ALIASES_PROPERTY: &str = "aliases";

#[derive(Default)]
pub struct AliasRegistry {
    table: RwLock<BTreeMap<String, Obj>>,
}

impl AliasRegistry {
    /// Replace the table with what `system` holds.
    pub fn hydrate(&self, system: &ObjectDocument) {
        self.replace(aliases_of(system));
    }

    pub fn replace(&self, aliases: BTreeMap<String, Obj>) {
        debug!(count = aliases.len(), "Alias table updated");
        *self.table.write().unwrap() = aliases;
    }

    pub fn clear(&self) {
        self.table.write().unwrap().clear();
    }

    pub fn resolve(&self, name: &str) -> Option<Obj> {
        self.table.read().unwrap().get(name).copied()
    }

    pub fn all(&self) -> BTreeMap<String, Obj> {
        self.table.read().unwrap().clone()
    }
}

/// The aliases stored on `system`. Entries that aren't object references are skipped.
pub fn aliases_of(system: &ObjectDocument) -> BTreeMap<String, Obj> {
    let Some(stored) = system.properties.get(ALIASES_PROPERTY) else {
        return BTreeMap::new();
    };
    let Some(map) = stored.as_map() else {
        warn!(id = ?system.id, "Alias property is not an object; ignoring it");
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(name, target)| match target.as_obj() {
            Some(id) => Some((name.clone(), id)),
            None => {
                warn!(name, "Alias target is not an object reference; ignoring it");
                None
            }
        })
        .collect()
}

pub fn aliases_var(aliases: &BTreeMap<String, Obj>) -> Var {
    v_map_iter(aliases.iter().map(|(name, id)| (name.clone(), v_obj(*id))))
}
