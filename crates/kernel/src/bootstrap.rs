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

//! Creation of the three fixed objects every world has. Safe to run any number of times: existing
//! objects only gain properties they lack, and existing aliases are left alone.

use crate::aliases::ALIASES_PROPERTY;
use crate::manager::{BIN_PROPERTY, ObjectManager};
use protocosm_common::model::{DocumentPatch, ObjectDocument, StoreError, WorldStateError};
use protocosm_var::{
    NOTHING, Obj, RECYCLER, ROOT_PROTOTYPE, SYSTEM_OBJECT, Var, v_empty_list, v_empty_map, v_str,
};
use tracing::{info, warn};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BootstrapReport {
    pub created: Vec<Obj>,
    /// Properties added to objects that already existed.
    pub merged_properties: Vec<(Obj, String)>,
    pub registered_aliases: Vec<String>,
}

impl BootstrapReport {
    /// Nothing needed doing.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.merged_properties.is_empty()
            && self.registered_aliases.is_empty()
    }
}

fn seeds() -> [(Obj, Obj, Vec<(&'static str, Var)>); 3] {
    [
        (
            SYSTEM_OBJECT,
            NOTHING,
            vec![
                ("name", v_str("System Object")),
                (ALIASES_PROPERTY, v_empty_map()),
            ],
        ),
        (
            ROOT_PROTOTYPE,
            SYSTEM_OBJECT,
            vec![("name", v_str("Root Prototype"))],
        ),
        (
            RECYCLER,
            ROOT_PROTOTYPE,
            vec![("name", v_str("Recycler")), (BIN_PROPERTY, v_empty_list())],
        ),
    ]
}

const DEFAULT_ALIASES: [(&str, Obj); 3] = [
    ("system", SYSTEM_OBJECT),
    ("root", ROOT_PROTOTYPE),
    ("recycler", RECYCLER),
];

pub fn bootstrap(manager: &ObjectManager) -> Result<BootstrapReport, WorldStateError> {
    let store = manager.store();
    let mut report = BootstrapReport::default();

    for (id, parent, properties) in seeds() {
        let existing = match store.get(id)? {
            Some(existing) => existing,
            None => {
                let mut doc = ObjectDocument::new(id, parent);
                for (name, value) in &properties {
                    doc.properties.insert(name.to_string(), value.clone());
                }
                match store.create(doc) {
                    Ok(_) => {
                        report.created.push(id);
                        manager.invalidate(id);
                        continue;
                    }
                    // Another process got there first; merge into theirs.
                    Err(StoreError::AlreadyExists(_)) => {
                        store.get(id)?.ok_or(WorldStateError::ObjectNotFound(id))?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let mut patch = DocumentPatch::default();
        if existing.recycled {
            warn!(?id, "Bootstrap object was recycled; restoring it");
            patch = patch.with_recycled(false);
        }
        for (name, value) in properties {
            if !existing.properties.contains_key(name) {
                patch = patch.with_property(name, value);
                report.merged_properties.push((id, name.to_string()));
            }
        }
        if !patch.is_empty() {
            store.update(id, patch)?;
        }
        manager.invalidate(id);
    }

    let stored = manager.stored_aliases()?;
    for (name, id) in DEFAULT_ALIASES {
        if !stored.contains_key(name) {
            manager.register_alias(name, id)?;
            report.registered_aliases.push(name.to_string());
        }
    }

    info!(
        created = report.created.len(),
        merged = report.merged_properties.len(),
        aliases = report.registered_aliases.len(),
        "Bootstrap complete"
    );
    Ok(report)
}
