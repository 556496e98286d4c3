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

use crate::aliases::{ALIASES_PROPERTY, AliasRegistry, aliases_of, aliases_var};
use crate::config::KernelConfig;
use crate::engine::{CompiledMethod, Engine};
use crate::object::ObjectHandle;
use crate::registry::Registry;
use crate::resolver::{Resolver, WorldCache};
use chrono::Utc;
use protocosm_common::model::{
    ChangeEvent, DocumentPatch, MethodDef, MethodMap, ObjectDocument, Privilege, PropertyMap,
    StoreError, WorldStateError,
};
use protocosm_compiler::Program;
use protocosm_db::{CacheStats, ChangeListener, FeedWatcher, ObjectStore, watch};
use protocosm_var::{
    Obj, RECYCLER, ROOT_PROTOTYPE, SYSTEM_OBJECT, Var, v_list_iter, v_map_iter, v_obj, v_str,
    v_string,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Property of the recycler holding snapshots of recycled objects.
pub const BIN_PROPERTY: &str = "bin";

/// Bound on retries when a freshly allocated identity turns out to be taken by a concurrent
/// creator.
const CREATE_ATTEMPTS: usize = 16;

/// What a new object starts with.
#[derive(Clone, Debug)]
pub struct CreateSpec {
    pub parent: Obj,
    pub properties: PropertyMap,
    pub methods: MethodMap,
}

impl Default for CreateSpec {
    fn default() -> Self {
        Self::new(ROOT_PROTOTYPE)
    }
}

impl CreateSpec {
    pub fn new(parent: Obj) -> Self {
        Self {
            parent,
            properties: PropertyMap::new(),
            methods: MethodMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: Var) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    pub fn with_method(mut self, name: &str, code: &str) -> Self {
        self.methods.insert(name.to_string(), MethodDef::new(code));
        self
    }
}

/// Keeps this process's cache and alias table in step with writes made anywhere.
struct CacheInvalidator {
    store: Arc<dyn ObjectStore>,
    cache: Arc<WorldCache>,
    aliases: Arc<AliasRegistry>,
}

impl ChangeListener for CacheInvalidator {
    fn on_change(&self, event: ChangeEvent) {
        self.cache.invalidate(event.document_id);
        if event.document_id == SYSTEM_OBJECT {
            match &event.full_document {
                Some(system) => self.aliases.hydrate(system),
                None => self.aliases.clear(),
            }
        }
    }

    fn on_resync(&self) {
        // Whatever changed in the gap is unknown.
        self.cache.invalidate_all();
        match self.store.get(SYSTEM_OBJECT) {
            Ok(Some(system)) => self.aliases.hydrate(&system),
            Ok(None) => self.aliases.clear(),
            Err(e) => error!(error = %e, "Could not re-read aliases after change feed resync"),
        }
    }
}

/// The entry point to a world: loads, creates and recycles objects, owns the cache and the alias
/// table, and keeps both coherent through the store's change feed.
pub struct ObjectManager {
    store: Arc<dyn ObjectStore>,
    cache: Arc<WorldCache>,
    aliases: Arc<AliasRegistry>,
    engine: Engine,
    config: KernelConfig,
    watcher: Mutex<Option<FeedWatcher>>,
}

impl ObjectManager {
    pub fn start(
        store: Arc<dyn ObjectStore>,
        config: KernelConfig,
    ) -> Result<Arc<Self>, WorldStateError> {
        let cache = Arc::new(WorldCache::new());
        let aliases = Arc::new(AliasRegistry::default());
        let watcher = watch(
            store.clone(),
            config.feed.clone(),
            CacheInvalidator {
                store: store.clone(),
                cache: cache.clone(),
                aliases: aliases.clone(),
            },
        )?;

        match store.get(SYSTEM_OBJECT)? {
            Some(system) => aliases.hydrate(&system),
            None => info!("No system object yet; alias table is empty"),
        }

        if config.preload_on_start {
            let live = store.list_all(false)?;
            let count = live.len();
            cache.preload(live.into_iter().map(|doc| (doc.id, Arc::new(doc))));
            info!(count, "Preloaded live objects");
        }

        info!(
            aliases = aliases.all().len(),
            max_call_depth = config.max_call_depth,
            "Object manager started"
        );
        Ok(Arc::new(Self {
            store,
            cache,
            aliases,
            engine: Engine::new(config.tick_slice),
            config,
            watcher: Mutex::new(Some(watcher)),
        }))
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn cache(&self) -> &WorldCache {
        &self.cache
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            self.store.as_ref(),
            &self.cache,
            self.config.max_parent_depth,
        )
    }

    /// A live object, or `None` if it doesn't exist or was recycled.
    pub fn load(self: &Arc<Self>, id: Obj) -> Result<Option<ObjectHandle>, WorldStateError> {
        let doc = self.resolver().live_document(id)?;
        Ok(doc.map(|doc| ObjectHandle::new(self.clone(), doc)))
    }

    /// Like `load`, but recycled objects are returned too.
    pub fn load_including_recycled(
        self: &Arc<Self>,
        id: Obj,
    ) -> Result<Option<ObjectHandle>, WorldStateError> {
        let doc = self.resolver().document(id)?;
        Ok(doc.map(|doc| ObjectHandle::new(self.clone(), doc)))
    }

    /// Create an object at the lowest free identity.
    pub fn create(self: &Arc<Self>, spec: CreateSpec) -> Result<ObjectHandle, WorldStateError> {
        if !spec.parent.terminates_chain() && self.resolver().live_document(spec.parent)?.is_none()
        {
            return Err(WorldStateError::ObjectNotFound(spec.parent));
        }

        for _ in 0..CREATE_ATTEMPTS {
            let id = self.store.next_id()?;
            let mut doc = ObjectDocument::new(id, spec.parent);
            doc.properties = spec.properties.clone();
            doc.methods = spec.methods.clone();
            match self.store.create(doc) {
                Ok(created) => {
                    let created = Arc::new(created);
                    self.cache.invalidate(id);
                    self.cache.set_object(id, created.clone());
                    info!(?id, parent = ?spec.parent, "Created object");
                    return Ok(ObjectHandle::new(self.clone(), created));
                }
                Err(StoreError::AlreadyExists(_)) => {
                    debug!(?id, "Identity taken by a concurrent create; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Transport("could not allocate an object identity".to_string()).into())
    }

    /// Retire an object: snapshot it into the recycler's bin, drop its aliases, and mark it
    /// recycled so its identity can be reused. Children keep pointing at it and stop inheriting
    /// through it.
    pub fn recycle(&self, id: Obj, privilege: Privilege) -> Result<(), WorldStateError> {
        privilege.check(Privilege::Builder, "recycle")?;
        if id.is_bootstrap() {
            return Err(WorldStateError::PermissionDenied(format!(
                "{id} is a bootstrap object and cannot be recycled"
            )));
        }
        let Some(doc) = self.store.get(id)?.filter(|doc| !doc.recycled) else {
            return Err(WorldStateError::ObjectNotFound(id));
        };
        self.clear_aliases_for(id)?;
        self.snapshot_into_bin(&doc)?;
        self.store.recycle(id)?;
        self.cache.invalidate(id);
        info!(?id, "Recycled object");
        Ok(())
    }

    /// Remove an object's document outright. Its identity becomes free for reuse, but no
    /// snapshot is kept and the original creation time is lost.
    pub fn purge(&self, id: Obj, privilege: Privilege) -> Result<(), WorldStateError> {
        privilege.check(Privilege::Wizard, "purge")?;
        if id.is_bootstrap() {
            return Err(WorldStateError::PermissionDenied(format!(
                "{id} is a bootstrap object and cannot be purged"
            )));
        }
        if self.store.get(id)?.is_none() {
            return Err(WorldStateError::ObjectNotFound(id));
        }
        self.clear_aliases_for(id)?;
        self.store.delete(id)?;
        self.cache.invalidate(id);
        info!(?id, "Purged object");
        Ok(())
    }

    /// Live children of `id`.
    pub fn children(&self, id: Obj) -> Result<Vec<Obj>, WorldStateError> {
        Ok(self
            .store
            .get_children(id)?
            .into_iter()
            .map(|doc| doc.id)
            .collect())
    }

    pub fn list(&self, include_recycled: bool) -> Result<Vec<ObjectDocument>, WorldStateError> {
        Ok(self.store.list_all(include_recycled)?)
    }

    pub fn aliases(&self) -> BTreeMap<String, Obj> {
        self.aliases.all()
    }

    pub fn resolve_alias(&self, name: &str) -> Option<Obj> {
        self.aliases.resolve(name)
    }

    /// Aliases as currently stored, bypassing the in-memory table.
    pub fn stored_aliases(&self) -> Result<BTreeMap<String, Obj>, WorldStateError> {
        Ok(match self.store.get(SYSTEM_OBJECT)? {
            Some(system) => aliases_of(&system),
            None => BTreeMap::new(),
        })
    }

    /// Point `name` at `id`, replacing any previous target.
    pub fn register_alias(&self, name: &str, id: Obj) -> Result<(), WorldStateError> {
        if name.is_empty() {
            return Err(WorldStateError::InvalidAlias(name.to_string(), id));
        }
        match self.store.get(id)? {
            Some(doc) if !doc.recycled => {}
            _ => return Err(WorldStateError::InvalidAlias(name.to_string(), id)),
        }
        let Some(system) = self.store.get(SYSTEM_OBJECT)? else {
            return Err(WorldStateError::ObjectNotFound(SYSTEM_OBJECT));
        };
        let mut aliases = aliases_of(&system);
        aliases.insert(name.to_string(), id);
        self.write_aliases(aliases)?;
        info!(name, ?id, "Registered alias");
        Ok(())
    }

    fn clear_aliases_for(&self, id: Obj) -> Result<(), WorldStateError> {
        let mut aliases = self.stored_aliases()?;
        let before = aliases.len();
        aliases.retain(|_, target| *target != id);
        if aliases.len() == before {
            return Ok(());
        }
        debug!(?id, removed = before - aliases.len(), "Dropping aliases");
        self.write_aliases(aliases)
    }

    fn write_aliases(&self, aliases: BTreeMap<String, Obj>) -> Result<(), WorldStateError> {
        let patch = DocumentPatch::default().with_property(ALIASES_PROPERTY, aliases_var(&aliases));
        self.store.update(SYSTEM_OBJECT, patch)?;
        self.cache.invalidate(SYSTEM_OBJECT);
        self.aliases.replace(aliases);
        Ok(())
    }

    fn snapshot_into_bin(&self, doc: &ObjectDocument) -> Result<(), WorldStateError> {
        let Some(recycler) = self.store.get(RECYCLER)? else {
            warn!(id = ?doc.id, "No recycler; recycling without a snapshot");
            return Ok(());
        };
        let mut bin = recycler
            .properties
            .get(BIN_PROPERTY)
            .and_then(|bin| bin.as_list())
            .map(|bin| bin.to_vec())
            .unwrap_or_default();
        bin.push(snapshot(doc));
        if let Some(limit) = self.config.recycle_bin_limit
            && bin.len() > limit
        {
            let excess = bin.len() - limit;
            bin.drain(..excess);
        }
        let patch = DocumentPatch::default().with_property(BIN_PROPERTY, v_list_iter(bin));
        self.store.update(RECYCLER, patch)?;
        self.cache.invalidate(RECYCLER);
        Ok(())
    }

    /// The compiled program `name` dispatches to on `this`, from the cache while its source is
    /// unchanged, and the object defining it.
    pub(crate) fn method_program(
        &self,
        this: &ObjectHandle,
        name: &str,
    ) -> Result<(Obj, Program), WorldStateError> {
        let not_found = || WorldStateError::MethodNotFound(this.id(), name.to_string());
        let definer_doc = this.method_definer(name)?.ok_or_else(not_found)?;
        let def = definer_doc.methods.get(name).ok_or_else(not_found)?;
        let definer = definer_doc.id;
        let source_hash = CompiledMethod::source_hash(&def.code);
        if let Some(compiled) = self.cache.get_compiled_method(definer, name)
            && compiled.source_hash == source_hash
        {
            return Ok((definer, compiled.program));
        }
        let program = self.engine.compile(&def.code).map_err(|error| {
            WorldStateError::Compile {
                obj: definer,
                method: name.to_string(),
                error,
            }
        })?;
        self.cache.set_compiled_method(
            definer,
            name,
            CompiledMethod {
                source_hash,
                program: program.clone(),
            },
        );
        debug!(?definer, method = name, "Compiled method");
        Ok((definer, program))
    }

    /// Invoke `method` on `id` as a caller holding `privilege`.
    pub async fn call(
        self: &Arc<Self>,
        id: Obj,
        method: &str,
        args: Vec<Var>,
        privilege: Privilege,
    ) -> Result<Var, WorldStateError> {
        Registry::new(self.clone(), privilege)
            .call_method(id, method.to_string(), args)
            .await
    }

    /// Drop cached state for `id` now, rather than waiting for the change feed.
    pub fn invalidate(&self, id: Obj) {
        self.cache.invalidate(id);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stop watching the change feed. The manager still works, but no longer sees other
    /// processes' writes.
    pub fn shutdown(&self) {
        if let Some(watcher) = self.watcher.lock().unwrap().take() {
            watcher.stop();
            info!("Object manager stopped watching the change feed");
        }
    }
}

/// The recycler's record of a retired object.
fn snapshot(doc: &ObjectDocument) -> Var {
    let methods = doc
        .methods
        .iter()
        .map(|(name, def)| (name.clone(), v_str(&def.code)));
    v_map_iter([
        ("id".to_string(), v_obj(doc.id)),
        ("parent".to_string(), v_obj(doc.parent)),
        ("properties".to_string(), v_map_iter(doc.properties.clone())),
        ("methods".to_string(), v_map_iter(methods)),
        ("created".to_string(), v_string(doc.created.to_rfc3339())),
        ("recycled_at".to_string(), v_string(Utc::now().to_rfc3339())),
    ])
}
