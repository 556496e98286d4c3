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

pub use crate::model::document::{MethodDef, MethodMap, ObjectDocument, PropertyMap};
pub use crate::model::events::{ChangeEvent, ChangeOperation};
pub use crate::model::patch::DocumentPatch;
pub use crate::model::permissions::Privilege;
pub use crate::model::world_state::{StoreError, WorldStateError};
use thiserror::Error;

mod document;
mod events;
mod patch;
mod permissions;
mod world_state;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Failure to parse string: {0}")]
    StringLexError(String),
    #[error("Failure to parse program @ {line}/{column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        context: String,
        end_line_col: Option<(usize, usize)>,
        message: String,
    },
    #[error("Unknown built-in function: {0}")]
    UnknownBuiltinFunction(String),
    #[error("Wrong number of arguments to {name}: expected {expected}, got {got}")]
    BuiltinArity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("{0} outside of a loop")]
    OutsideLoop(String),
    #[error("Cannot assign to context variable: {0}")]
    AssignToConst(String),
    #[error("`registry` may only be used as the target of a call")]
    RegistryMisuse,
    #[error("Invalid l-value for assignment")]
    InvalidAssignment,
}
