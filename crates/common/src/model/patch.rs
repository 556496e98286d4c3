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

use crate::model::document::{MethodDef, ObjectDocument};
use chrono::{DateTime, Utc};
use protocosm_var::{Obj, Var};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A partial update to a stored document. Entries are applied individually, so two writers touching
/// different properties of the same object do not clobber each other; writers touching the same
/// entry resolve last-write-wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Obj>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_properties: BTreeMap<String, Var>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unset_properties: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_methods: BTreeMap<String, MethodDef>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unset_methods: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recycled: Option<bool>,
}

impl DocumentPatch {
    pub fn with_parent(mut self, parent: Obj) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_property(mut self, name: &str, value: Var) -> Self {
        self.unset_properties.remove(name);
        self.set_properties.insert(name.to_string(), value);
        self
    }

    pub fn without_property(mut self, name: &str) -> Self {
        self.set_properties.remove(name);
        self.unset_properties.insert(name.to_string());
        self
    }

    pub fn with_method(mut self, name: &str, def: MethodDef) -> Self {
        self.unset_methods.remove(name);
        self.set_methods.insert(name.to_string(), def);
        self
    }

    pub fn without_method(mut self, name: &str) -> Self {
        self.set_methods.remove(name);
        self.unset_methods.insert(name.to_string());
        self
    }

    pub fn with_recycled(mut self, recycled: bool) -> Self {
        self.recycled = Some(recycled);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_none()
            && self.set_properties.is_empty()
            && self.unset_properties.is_empty()
            && self.set_methods.is_empty()
            && self.unset_methods.is_empty()
            && self.recycled.is_none()
    }

    /// Apply onto `doc`, stamping `modified` with `now` even if the patch is empty.
    pub fn apply(&self, doc: &mut ObjectDocument, now: DateTime<Utc>) {
        if let Some(parent) = self.parent {
            doc.parent = parent;
        }
        for name in &self.unset_properties {
            doc.properties.remove(name);
        }
        for (name, value) in &self.set_properties {
            doc.properties.insert(name.clone(), value.clone());
        }
        for name in &self.unset_methods {
            doc.methods.remove(name);
        }
        for (name, def) in &self.set_methods {
            doc.methods.insert(name.clone(), def.clone());
        }
        if let Some(recycled) = self.recycled {
            doc.recycled = recycled;
        }
        doc.modified = now;
    }
}
