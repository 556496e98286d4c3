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

use crate::manager::ObjectManager;
use chrono::{DateTime, Utc};
use protocosm_common::model::{DocumentPatch, MethodDef, ObjectDocument, WorldStateError};
use protocosm_var::{Obj, Var};
use std::fmt::{Debug, Formatter};
use std::mem;
use std::sync::Arc;
use tracing::debug;

/// A loaded object. Reads fall through to ancestors; writes land on a local copy and are recorded
/// as a patch until `save` sends them to the store. The document is shared with the cache until
/// the first local write.
#[derive(Clone)]
pub struct ObjectHandle {
    manager: Arc<ObjectManager>,
    doc: Arc<ObjectDocument>,
    dirty: DocumentPatch,
}

impl Debug for ObjectHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("id", &self.doc.id)
            .field("parent", &self.doc.parent)
            .field("dirty", &!self.dirty.is_empty())
            .finish()
    }
}

impl ObjectHandle {
    pub(crate) fn new(manager: Arc<ObjectManager>, doc: Arc<ObjectDocument>) -> Self {
        Self {
            manager,
            doc,
            dirty: DocumentPatch::default(),
        }
    }

    pub fn id(&self) -> Obj {
        self.doc.id
    }

    pub fn parent(&self) -> Obj {
        self.doc.parent
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.doc.created
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.doc.modified
    }

    pub fn is_recycled(&self) -> bool {
        self.doc.recycled
    }

    /// The local copy, including unsaved edits.
    pub fn document(&self) -> &ObjectDocument {
        &self.doc
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// An unsaved reparent must not read or fill the shared chain cache.
    fn chain_cacheable(&self) -> bool {
        self.dirty.parent.is_none()
    }

    /// Read a property, inherited if not defined here.
    pub fn get(&self, name: &str) -> Result<Option<Var>, WorldStateError> {
        let resolver = self.manager.resolver();
        Ok(resolver.property(&self.doc, name, self.chain_cacheable())?)
    }

    /// Only this object's own value.
    pub fn get_own(&self, name: &str) -> Option<&Var> {
        self.doc.properties.get(name)
    }

    pub fn set(&mut self, name: &str, value: Var) {
        Arc::make_mut(&mut self.doc)
            .properties
            .insert(name.to_string(), value.clone());
        self.dirty = mem::take(&mut self.dirty).with_property(name, value);
    }

    /// Remove this object's own value, exposing whatever an ancestor defines. Returns whether
    /// there was one.
    pub fn unset(&mut self, name: &str) -> bool {
        let had = Arc::make_mut(&mut self.doc).properties.remove(name).is_some();
        self.dirty = mem::take(&mut self.dirty).without_property(name);
        had
    }

    /// The document defining the method `name` dispatches to.
    pub(crate) fn method_definer(
        &self,
        name: &str,
    ) -> Result<Option<Arc<ObjectDocument>>, WorldStateError> {
        let resolver = self.manager.resolver();
        Ok(resolver.method_definer(&self.doc, name, self.chain_cacheable())?)
    }

    /// Source of the method `name` would dispatch to.
    pub fn method_source(&self, name: &str) -> Result<Option<String>, WorldStateError> {
        let resolver = self.manager.resolver();
        let found = resolver.method(&self.doc, name, self.chain_cacheable())?;
        Ok(found.map(|(_, def)| def.code))
    }

    pub fn set_method(&mut self, name: &str, code: &str) {
        let def = MethodDef::new(code);
        Arc::make_mut(&mut self.doc)
            .methods
            .insert(name.to_string(), def.clone());
        self.dirty = mem::take(&mut self.dirty).with_method(name, def);
        self.manager.cache().remove_compiled_method(self.doc.id, name);
    }

    pub fn remove_method(&mut self, name: &str) -> bool {
        let had = Arc::make_mut(&mut self.doc).methods.remove(name).is_some();
        self.dirty = mem::take(&mut self.dirty).without_method(name);
        self.manager.cache().remove_compiled_method(self.doc.id, name);
        had
    }

    /// Reparent. Fails if `parent` is this object or one of its descendants, or doesn't exist.
    pub fn set_parent(&mut self, parent: Obj) -> Result<(), WorldStateError> {
        let id = self.doc.id;
        if parent == id {
            return Err(WorldStateError::RecursiveParent(id, parent));
        }
        if !parent.terminates_chain() {
            let resolver = self.manager.resolver();
            let Some(parent_doc) = resolver.live_document(parent)? else {
                return Err(WorldStateError::ObjectNotFound(parent));
            };
            let chain = resolver.parent_chain(parent, parent_doc.parent, true)?;
            if chain.cyclic || chain.contains(id) {
                return Err(WorldStateError::RecursiveParent(id, parent));
            }
        }
        Arc::make_mut(&mut self.doc).parent = parent;
        self.dirty = mem::take(&mut self.dirty).with_parent(parent);
        Ok(())
    }

    /// Write pending edits to the store and pick up the stored result, including the new
    /// modification time.
    pub fn save(&mut self) -> Result<(), WorldStateError> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let id = self.doc.id;
        let patch = mem::take(&mut self.dirty);
        if let Err(e) = self.manager.store().update(id, patch.clone()) {
            self.dirty = patch;
            return Err(e.into());
        }
        self.manager.invalidate(id);
        if let Some(doc) = self.manager.resolver().document(id)? {
            self.doc = doc;
        }
        debug!(?id, "Saved object");
        Ok(())
    }

    /// Invoke a method on this object, with the configured default privilege. The call sees the
    /// stored state, not unsaved edits.
    pub async fn call(&self, method: &str, args: Vec<Var>) -> Result<Var, WorldStateError> {
        let privilege = self.manager.config().method_privilege;
        self.manager.call(self.doc.id, method, args, privilege).await
    }
}
