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

//! Prototype-chain resolution: reading a property or finding a method means looking at the object
//! itself, then at each ancestor from the immediate parent toward the root. The chain is
//! materialised once per object and cached until something in it changes.

use crate::engine::CompiledMethod;
use protocosm_common::model::{MethodDef, ObjectDocument, StoreError};
use protocosm_db::{ObjectCache, ObjectStore, ParentChain};
use protocosm_var::{Obj, Var};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// The per-process cache as the kernel uses it: shared documents and compiled methods.
pub type WorldCache = ObjectCache<Arc<ObjectDocument>, CompiledMethod>;

/// Cache-backed lookups over one store.
pub struct Resolver<'a> {
    store: &'a dyn ObjectStore,
    cache: &'a WorldCache,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, cache: &'a WorldCache, max_depth: usize) -> Self {
        Self {
            store,
            cache,
            max_depth,
        }
    }

    /// The stored document for `id`, from the cache if present. Recycled documents are returned
    /// too; callers decide whether they count.
    pub fn document(&self, id: Obj) -> Result<Option<Arc<ObjectDocument>>, StoreError> {
        if let Some(doc) = self.cache.get_object(id) {
            return Ok(Some(doc));
        }
        let Some(doc) = self.store.get(id)? else {
            return Ok(None);
        };
        let doc = Arc::new(doc);
        self.cache.set_object(id, doc.clone());
        debug!(?id, "Cached object document");
        Ok(Some(doc))
    }

    /// A live (non-recycled) document, or `None`.
    pub fn live_document(&self, id: Obj) -> Result<Option<Arc<ObjectDocument>>, StoreError> {
        Ok(self.document(id)?.filter(|doc| !doc.recycled))
    }

    /// Ancestors of `id`, whose parent is `parent`. The chain is cached under `id` only when
    /// `cacheable`, i.e. when `parent` is what the store holds rather than an unsaved edit.
    pub fn parent_chain(
        &self,
        id: Obj,
        parent: Obj,
        cacheable: bool,
    ) -> Result<ParentChain, StoreError> {
        if cacheable
            && let Some(chain) = self.cache.get_parent_chain(id)
            && chain_starts_at(&chain, parent)
        {
            return Ok(chain);
        }

        let mut ancestors = vec![];
        let mut seen = HashSet::from([id]);
        let mut cyclic = false;
        let mut terminated_at = None;
        let mut next = parent;
        while !next.terminates_chain() {
            if !seen.insert(next) || ancestors.len() >= self.max_depth {
                warn!(?id, at = ?next, depth = ancestors.len(), "Cyclic or over-deep parent chain");
                cyclic = true;
                break;
            }
            let Some(doc) = self.live_document(next)? else {
                debug!(?id, missing = ?next, "Parent chain ends at a missing ancestor");
                terminated_at = Some(next);
                break;
            };
            ancestors.push(next);
            next = doc.parent;
        }

        let mut chain = ParentChain::new(ancestors, cyclic);
        if let Some(missing) = terminated_at {
            chain = chain.terminated_at(missing);
        }
        if cacheable {
            self.cache.set_parent_chain(id, chain.clone());
        }
        Ok(chain)
    }

    /// The first value `lookup` finds walking `doc`'s ancestors. A cyclic chain is not trusted
    /// past the object itself.
    fn inherited<T>(
        &self,
        doc: &ObjectDocument,
        cacheable: bool,
        lookup: impl Fn(&Arc<ObjectDocument>) -> Option<T>,
    ) -> Result<Option<(Obj, T)>, StoreError> {
        let chain = self.parent_chain(doc.id, doc.parent, cacheable)?;
        if chain.cyclic {
            return Ok(None);
        }
        for ancestor in chain.ancestors {
            let Some(ancestor_doc) = self.live_document(ancestor)? else {
                continue;
            };
            if let Some(found) = lookup(&ancestor_doc) {
                return Ok(Some((ancestor, found)));
            }
        }
        Ok(None)
    }

    /// Read a property: own definition first, then the closest ancestor's.
    pub fn property(
        &self,
        doc: &ObjectDocument,
        name: &str,
        cacheable: bool,
    ) -> Result<Option<Var>, StoreError> {
        if let Some(v) = doc.properties.get(name) {
            return Ok(Some(v.clone()));
        }
        let found = self.inherited(doc, cacheable, |d| d.properties.get(name).cloned())?;
        Ok(found.map(|(_, v)| v))
    }

    /// Find a method, returning the object that defines it.
    pub fn method(
        &self,
        doc: &ObjectDocument,
        name: &str,
        cacheable: bool,
    ) -> Result<Option<(Obj, MethodDef)>, StoreError> {
        if let Some(m) = doc.methods.get(name) {
            return Ok(Some((doc.id, m.clone())));
        }
        self.inherited(doc, cacheable, |d| d.methods.get(name).cloned())
    }

    /// The document that defines method `name` for `doc`: `doc` itself or its closest ancestor.
    pub fn method_definer(
        &self,
        doc: &Arc<ObjectDocument>,
        name: &str,
        cacheable: bool,
    ) -> Result<Option<Arc<ObjectDocument>>, StoreError> {
        if doc.methods.contains_key(name) {
            return Ok(Some(doc.clone()));
        }
        let found = self.inherited(doc, cacheable, |d| {
            d.methods.contains_key(name).then(|| d.clone())
        })?;
        Ok(found.map(|(_, definer)| definer))
    }
}

fn chain_starts_at(chain: &ParentChain, parent: Obj) -> bool {
    match chain.ancestors.first() {
        Some(first) => *first == parent,
        None => match chain.terminated_at {
            Some(missing) => missing == parent,
            None => parent.terminates_chain(),
        },
    }
}
