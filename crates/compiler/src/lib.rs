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

//! The method language: parse, generate code, and package the result as a `Program`.

mod ast;
mod builtins;
mod codegen;
mod labels;
mod names;
mod opcode;
mod parse;
mod program;

#[cfg(test)]
mod codegen_tests;

pub use crate::ast::{BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, Stmt, StmtNode, UnaryOp};
pub use crate::builtins::{ArgCount, BUILTINS, Builtin, BuiltinId, Builtins};
pub use crate::codegen::compile;
pub use crate::labels::{JumpLabel, Label, Offset};
pub use crate::names::{GlobalName, Name, Names};
pub use crate::opcode::Op;
pub use crate::parse::{Parse, REGISTRY_IDENT, parse_program};
pub use crate::program::{PrgInner, Program};
