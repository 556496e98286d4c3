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

use crate::model::CompileError;
use crate::tasks::Exception;
use protocosm_var::{E_COMPILE, E_INVARG, E_INVIND, E_PERM, E_RECMOVE, E_VERBNF, Error, ErrorCode, Obj};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the durable backend.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(Obj),
    #[error("Object already exists: {0}")]
    AlreadyExists(Obj),
    #[error("Store unavailable: {0}")]
    Transport(String),
    #[error("Could not encode or decode document: {0}")]
    Encoding(String),
}

/// Errors from operating on the live world: loading, creating, resolving and invoking objects.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorldStateError {
    #[error("Object not found: {0}")]
    ObjectNotFound(Obj),
    #[error("Method not found: {0}:{1}")]
    MethodNotFound(Obj, String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Recursive parent: {1} is {0} or one of its descendants")]
    RecursiveParent(Obj, Obj),
    #[error("Invalid alias {0} -> {1}")]
    InvalidAlias(String, Obj),
    #[error("Failed to compile {obj}:{method}: {error}")]
    Compile {
        obj: Obj,
        method: String,
        #[source]
        error: CompileError,
    },
    #[error("Exception in {obj}:{method}: {exception}")]
    MethodException {
        obj: Obj,
        method: String,
        exception: Exception,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorldStateError {
    /// Fatal errors abort the whole invocation instead of surfacing inside method code.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorldStateError::Store(_))
    }

    /// The runtime error method code sees when a call it made fails with this error.
    pub fn to_error(&self) -> Error {
        match self {
            WorldStateError::ObjectNotFound(_) => E_INVIND.msg(self),
            WorldStateError::MethodNotFound(_, _) => E_VERBNF.msg(self),
            WorldStateError::PermissionDenied(_) => E_PERM.msg(self),
            WorldStateError::RecursiveParent(_, _) => E_RECMOVE.msg(self),
            WorldStateError::InvalidAlias(_, _) => E_INVARG.msg(self),
            WorldStateError::Compile { .. } => E_COMPILE.msg(self),
            WorldStateError::MethodException { exception, .. } => exception.error.clone(),
            WorldStateError::Store(_) => ErrorCode::ErrCustom("E_STORE".to_string()).msg(self),
        }
    }
}
