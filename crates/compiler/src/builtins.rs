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

/// Global registry of built-in function names.
use ArgCount::{Q, U};
use lazy_static::lazy_static;
use protocosm_common::model::CompileError;
use std::collections::HashMap;

lazy_static! {
    pub static ref BUILTINS: Builtins = Builtins::new();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuiltinId(pub u16);

pub enum ArgCount {
    Q(usize),
    U,
}

impl std::fmt::Display for ArgCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Q(n) => write!(f, "{n}"),
            U => write!(f, "any"),
        }
    }
}

pub struct Builtin {
    pub name: &'static str,
    pub min_args: ArgCount,
    pub max_args: ArgCount,
}

impl Builtin {
    pub fn check_arity(&self, got: usize) -> Result<(), CompileError> {
        let min_ok = match self.min_args {
            Q(n) => got >= n,
            U => true,
        };
        let max_ok = match self.max_args {
            Q(n) => got <= n,
            U => true,
        };
        if min_ok && max_ok {
            return Ok(());
        }
        let expected = match (&self.min_args, &self.max_args) {
            (Q(min), Q(max)) if min == max => min.to_string(),
            (min, max) => format!("{min}..{max}"),
        };
        Err(CompileError::BuiltinArity {
            name: self.name.to_string(),
            expected,
            got,
        })
    }
}

fn mk_builtin_table() -> Vec<Builtin> {
    let b = |name, min_args, max_args| Builtin {
        name,
        min_args,
        max_args,
    };
    vec![
        b("length", Q(1), Q(1)),
        b("tostr", Q(0), U),
        b("toint", Q(1), Q(1)),
        b("tofloat", Q(1), Q(1)),
        b("toliteral", Q(1), Q(1)),
        b("typeof", Q(1), Q(1)),
        b("raise", Q(1), Q(3)),
        b("keys", Q(1), Q(1)),
        b("values", Q(1), Q(1)),
        b("abs", Q(1), Q(1)),
        b("min", Q(1), U),
        b("max", Q(1), U),
        b("time", Q(0), Q(0)),
        b("suspend", Q(0), Q(1)),
        b("listappend", Q(2), Q(2)),
        b("listdelete", Q(2), Q(2)),
        b("mapdelete", Q(2), Q(2)),
        b("lowercase", Q(1), Q(1)),
        b("uppercase", Q(1), Q(1)),
    ]
}

pub struct Builtins {
    pub descriptors: Vec<Builtin>,
    offsets: HashMap<&'static str, BuiltinId>,
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtins {
    pub fn new() -> Self {
        let descriptors = mk_builtin_table();
        let offsets = descriptors
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name, BuiltinId(i as u16)))
            .collect();
        Self {
            descriptors,
            offsets,
        }
    }

    pub fn find_builtin(&self, name: &str) -> Option<BuiltinId> {
        self.offsets.get(name).copied()
    }

    pub fn description_for(&self, id: BuiltinId) -> Option<&Builtin> {
        self.descriptors.get(id.0 as usize)
    }

    pub fn name_of(&self, id: BuiltinId) -> Option<&'static str> {
        self.description_for(id).map(|b| b.name)
    }

    pub fn number_of(&self) -> usize {
        self.descriptors.len()
    }
}
