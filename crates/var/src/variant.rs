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

use crate::Obj;
use crate::var::Var;
use std::collections::BTreeMap;

/// String-keyed map, as stored in property values.
pub type Map = BTreeMap<String, Var>;

/// Our series of types
#[derive(Clone, Debug, PartialEq)]
pub enum Variant {
    None,
    Bool(bool),
    Obj(Obj),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Var>),
    Map(Map),
}
