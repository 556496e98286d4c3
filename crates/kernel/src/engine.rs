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

//! The method execution engine: compile method source, and drive a `MethodFrame` to completion,
//! serving its host requests through the registry of the calling context.

use crate::object::ObjectHandle;
use ahash::AHasher;
use crate::registry::{HostErr, Registry};
use crate::vm::{ExecutionResult, MethodFrame};
use protocosm_common::model::{CompileError, WorldStateError};
use protocosm_common::tasks::Exception;
use protocosm_compiler::Program;
use protocosm_var::Var;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// A compiled method body together with a hash of the source it was compiled from. The cache
/// keeps these per (definer, method name) and reuses one only while the stored source still
/// hashes the same.
#[derive(Clone, Debug)]
pub struct CompiledMethod {
    pub source_hash: u64,
    pub program: Program,
}

impl CompiledMethod {
    pub fn source_hash(source: &str) -> u64 {
        let mut hasher = AHasher::default();
        source.hash(&mut hasher);
        hasher.finish()
    }
}

/// Everything method code can reach.
pub struct ExecutionContext {
    /// The receiver, bound to `this`.
    pub this: ObjectHandle,
    /// The name the method was invoked by.
    pub method: String,
    /// The way out to the rest of the world: other objects, aliases, creation and recycling.
    pub registry: Registry,
    /// Bound to `args`.
    pub args: Vec<Var>,
}

pub struct Engine {
    tick_slice: usize,
}

impl Engine {
    pub fn new(tick_slice: usize) -> Self {
        Self {
            tick_slice: tick_slice.max(1),
        }
    }

    pub fn compile(&self, source: &str) -> Result<Program, CompileError> {
        protocosm_compiler::compile(source)
    }

    /// Run `program` to completion. The frame yields to the runtime every tick slice and at every
    /// host request, so many methods can be in flight on one thread.
    pub async fn execute(
        &self,
        program: Program,
        mut ctx: ExecutionContext,
    ) -> Result<Var, WorldStateError> {
        let this = ctx.this.id();
        let mut frame = MethodFrame::new(program, this, std::mem::take(&mut ctx.args));

        // The exception of the last nested call that failed without being caught, so its backtrace
        // is extended instead of restarted when it propagates out of this frame.
        let mut nested: Option<Exception> = None;
        loop {
            match frame.run(self.tick_slice) {
                ExecutionResult::Complete(v) => return Ok(v),
                ExecutionResult::Yield => tokio::task::yield_now().await,
                ExecutionResult::Exception(error) => {
                    let mut exception = match nested.take() {
                        Some(exception) if exception.error == error => exception,
                        _ => Exception::new(error),
                    };
                    exception.push_frame(this, &ctx.method, frame.line_number());
                    debug!(?this, method = %ctx.method, %exception, "Uncaught exception");
                    return Err(WorldStateError::MethodException {
                        obj: this,
                        method: ctx.method,
                        exception,
                    });
                }
                ExecutionResult::Request(request) => match ctx.registry.serve(request).await {
                    Ok(value) => frame.resume(value),
                    Err(HostErr::Fatal(e)) => return Err(e),
                    Err(HostErr::Raise(error, exception)) => {
                        nested = if frame.resume_exception(error) {
                            None
                        } else {
                            exception
                        };
                    }
                },
            }
        }
    }
}
