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

//! The reserved `registry` object method code calls into, and the serving of every other host
//! request a running frame makes: property access, nested method calls, alias lookups, suspends.

use crate::manager::{CreateSpec, ObjectManager};
use crate::object::ObjectHandle;
use crate::vm::HostRequest;
use futures::FutureExt;
use futures::future::BoxFuture;
use protocosm_common::model::{DocumentPatch, Privilege, StoreError, WorldStateError};
use protocosm_common::tasks::Exception;
use protocosm_var::{
    E_ARGS, E_INVARG, E_MAXREC, E_TYPE, Error, Obj, ROOT_PROTOTYPE, Var, v_bool, v_list_iter,
    v_map_iter, v_none, v_obj, v_str,
};
use std::sync::Arc;
use tracing::debug;

/// How a host request failed.
#[derive(Debug)]
pub enum HostErr {
    /// Surfaces inside method code as a raised error, catchable by `try`. A failed nested call
    /// carries its exception along so the backtrace keeps growing if nobody catches it.
    Raise(Error, Option<Exception>),
    /// Aborts the whole invocation.
    Fatal(WorldStateError),
}

impl From<WorldStateError> for HostErr {
    fn from(e: WorldStateError) -> Self {
        if e.is_fatal() {
            return HostErr::Fatal(e);
        }
        let exception = match &e {
            WorldStateError::MethodException { exception, .. } => Some(exception.clone()),
            _ => None,
        };
        HostErr::Raise(e.to_error(), exception)
    }
}

impl From<StoreError> for HostErr {
    fn from(e: StoreError) -> Self {
        HostErr::Fatal(e.into())
    }
}

impl From<Error> for HostErr {
    fn from(e: Error) -> Self {
        HostErr::Raise(e, None)
    }
}

/// A caller's view of the world: which manager, with what privilege, how deep in nested calls.
#[derive(Clone)]
pub struct Registry {
    manager: Arc<ObjectManager>,
    privilege: Privilege,
    depth: usize,
}

impl Registry {
    pub fn new(manager: Arc<ObjectManager>, privilege: Privilege) -> Self {
        Self {
            manager,
            privilege,
            depth: 0,
        }
    }

    pub fn manager(&self) -> &Arc<ObjectManager> {
        &self.manager
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Invoke `method` on `id`, one call level below this one.
    pub fn call_method(
        &self,
        id: Obj,
        method: String,
        args: Vec<Var>,
    ) -> BoxFuture<'static, Result<Var, WorldStateError>> {
        let registry = self.clone();
        async move { registry.invoke(id, &method, args).await }.boxed()
    }

    async fn invoke(&self, id: Obj, method: &str, args: Vec<Var>) -> Result<Var, WorldStateError> {
        let max_depth = self.manager.config().max_call_depth;
        if self.depth >= max_depth {
            return Err(WorldStateError::MethodException {
                obj: id,
                method: method.to_string(),
                exception: Exception::new(
                    E_MAXREC.msg(format!("call depth limit of {max_depth} reached")),
                ),
            });
        }
        let this = self.handle(id)?;
        let (definer, program) = self.manager.method_program(&this, method)?;
        debug!(?id, ?definer, method, depth = self.depth, "Invoking method");
        let ctx = crate::engine::ExecutionContext {
            this,
            method: method.to_string(),
            registry: Registry {
                depth: self.depth + 1,
                ..self.clone()
            },
            args,
        };
        self.manager.engine().execute(program, ctx).await
    }

    fn handle(&self, id: Obj) -> Result<ObjectHandle, WorldStateError> {
        self.manager
            .load(id)?
            .ok_or(WorldStateError::ObjectNotFound(id))
    }

    /// Answer one request from a running frame.
    pub(crate) async fn serve(&self, request: HostRequest) -> Result<Var, HostErr> {
        match request {
            HostRequest::GetProp { obj, name } => {
                let resolver = self.manager.resolver();
                let Some(doc) = resolver.live_document(obj)? else {
                    return Err(WorldStateError::ObjectNotFound(obj).into());
                };
                Ok(resolver.property(&doc, &name, true)?.unwrap_or_else(v_none))
            }
            HostRequest::PutProp { obj, name, value } => {
                if self.manager.resolver().live_document(obj)?.is_none() {
                    return Err(WorldStateError::ObjectNotFound(obj).into());
                }
                let patch = DocumentPatch::default().with_property(&name, value.clone());
                self.manager.store().update(obj, patch)?;
                self.manager.invalidate(obj);
                Ok(value)
            }
            HostRequest::CallMethod { obj, name, args } => {
                Ok(self.call_method(obj, name, args).await?)
            }
            HostRequest::Registry { op, args } => self.dispatch(&op, args).await,
            HostRequest::ResolveAlias(name) => match self.manager.resolve_alias(&name) {
                Some(id) => Ok(v_obj(id)),
                None => Err(E_INVARG.msg(format!("no alias named ${name}")).into()),
            },
            HostRequest::Suspend(duration) => {
                if duration.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(duration).await;
                }
                Ok(v_none())
            }
        }
    }

    /// `registry:<op>(args...)`.
    pub(crate) async fn dispatch(&self, op: &str, args: Vec<Var>) -> Result<Var, HostErr> {
        let manager = &self.manager;
        match op {
            "load" => {
                let id = obj_arg(&args, 0)?;
                Ok(match manager.load(id)? {
                    Some(_) => v_obj(id),
                    None => v_none(),
                })
            }
            "valid" => Ok(v_bool(manager.load(obj_arg(&args, 0)?)?.is_some())),
            "create" => {
                let parent = match args.first() {
                    None => ROOT_PROTOTYPE,
                    Some(_) => obj_arg(&args, 0)?,
                };
                let mut spec = CreateSpec::new(parent);
                if let Some(properties) = args.get(1) {
                    let Some(properties) = properties.as_map() else {
                        return Err(E_TYPE.msg("create: properties must be an object").into());
                    };
                    spec.properties = properties.clone();
                }
                let handle = manager.create(spec)?;
                Ok(v_obj(handle.id()))
            }
            "recycle" => {
                manager.recycle(obj_arg(&args, 0)?, self.privilege)?;
                Ok(v_none())
            }
            "alias" => Ok(match manager.resolve_alias(str_arg(&args, 0)?) {
                Some(id) => v_obj(id),
                None => v_none(),
            }),
            "aliases" => Ok(v_map_iter(
                manager
                    .aliases()
                    .into_iter()
                    .map(|(name, id)| (name, v_obj(id))),
            )),
            "register_alias" => {
                self.privilege.check(Privilege::Builder, "register_alias")?;
                manager.register_alias(str_arg(&args, 0)?, obj_arg(&args, 1)?)?;
                Ok(v_none())
            }
            "children" => {
                let children = manager.children(obj_arg(&args, 0)?)?;
                Ok(v_list_iter(children.into_iter().map(v_obj)))
            }
            "parent" => Ok(v_obj(self.handle(obj_arg(&args, 0)?)?.parent())),
            "set_parent" => {
                let mut handle = self.handle(obj_arg(&args, 0)?)?;
                handle.set_parent(obj_arg(&args, 1)?)?;
                handle.save()?;
                Ok(v_none())
            }
            "set_method" => {
                self.privilege
                    .check(manager.config().method_privilege, "set_method")?;
                let mut handle = self.handle(obj_arg(&args, 0)?)?;
                handle.set_method(str_arg(&args, 1)?, str_arg(&args, 2)?);
                handle.save()?;
                Ok(v_none())
            }
            "method_source" => {
                let handle = self.handle(obj_arg(&args, 0)?)?;
                Ok(match handle.method_source(str_arg(&args, 1)?)? {
                    Some(source) => v_str(&source),
                    None => v_none(),
                })
            }
            "call" => {
                let id = obj_arg(&args, 0)?;
                let method = str_arg(&args, 1)?.to_string();
                let call_args = match args.get(2) {
                    None => vec![],
                    Some(list) => match list.as_list() {
                        Some(list) => list.to_vec(),
                        None => return Err(E_TYPE.msg("call: arguments must be an array").into()),
                    },
                };
                Ok(self.call_method(id, method, call_args).await?)
            }
            _ => Err(E_INVARG
                .msg(format!("unknown registry operation {op}"))
                .into()),
        }
    }
}

fn arg(args: &[Var], i: usize) -> Result<&Var, Error> {
    args.get(i)
        .ok_or_else(|| E_ARGS.msg(format!("missing argument {}", i + 1)))
}

fn obj_arg(args: &[Var], i: usize) -> Result<Obj, Error> {
    arg(args, i)?
        .as_obj()
        .ok_or_else(|| E_TYPE.msg(format!("argument {} must be an object reference", i + 1)))
}

fn str_arg(args: &[Var], i: usize) -> Result<&str, Error> {
    arg(args, i)?
        .as_str()
        .ok_or_else(|| E_TYPE.msg(format!("argument {} must be a string", i + 1)))
}
