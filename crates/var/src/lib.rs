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

pub mod encode;
mod error;
mod obj;
#[allow(clippy::module_inception)]
mod var;
mod variant;

pub use error::{Error, ErrorCode, ErrorCode::*};
pub use obj::{NOTHING, Obj, RECYCLER, ROOT_PROTOTYPE, SYSTEM_OBJECT};
use std::fmt::{Display, Formatter};
pub use var::{
    Var, v_bool, v_empty_list, v_empty_map, v_float, v_int, v_list, v_list_iter, v_map,
    v_map_iter, v_none, v_obj, v_objid, v_str, v_string,
};
pub use variant::{Map, Variant};

/// The type tags values carry, as reported by `typeof()` in method code and as used in the
/// persisted encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(non_camel_case_types)]
pub enum VarType {
    TYPE_NONE,
    TYPE_BOOL,
    TYPE_INT,
    TYPE_FLOAT,
    TYPE_STR,
    TYPE_OBJ,
    TYPE_LIST,
    TYPE_MAP,
}

impl VarType {
    /// Integers and floats share the `number` tag.
    pub fn to_literal(&self) -> &'static str {
        match self {
            VarType::TYPE_NONE => "null",
            VarType::TYPE_BOOL => "boolean",
            VarType::TYPE_INT | VarType::TYPE_FLOAT => "number",
            VarType::TYPE_STR => "string",
            VarType::TYPE_OBJ => "objref",
            VarType::TYPE_LIST => "array",
            VarType::TYPE_MAP => "object",
        }
    }
}

impl Display for VarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_literal())
    }
}
