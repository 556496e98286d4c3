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

//! Built-in functions callable from method code. Each family registers its functions into the
//! table at the offsets the compiler assigned them.

use crate::vm::HostRequest;
use crate::vm::builtins::bf_list_sets::register_bf_list_sets;
use crate::vm::builtins::bf_maps::register_bf_maps;
use crate::vm::builtins::bf_num::register_bf_num;
use crate::vm::builtins::bf_server::register_bf_server;
use crate::vm::builtins::bf_strings::register_bf_strings;
use crate::vm::builtins::bf_values::register_bf_values;
use lazy_static::lazy_static;
use protocosm_compiler::{BUILTINS, BuiltinId};
use protocosm_var::{E_INVARG, Error, Var};
use thiserror::Error;

mod bf_list_sets;
mod bf_maps;
mod bf_num;
mod bf_server;
mod bf_strings;
mod bf_values;

lazy_static! {
    pub(crate) static ref BUILTIN_REGISTRY: BuiltinRegistry = BuiltinRegistry::new();
}

/// The set of built-in functions, indexed by `BuiltinId`.
pub(crate) struct BuiltinRegistry {
    builtins: Vec<BuiltinFunction>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut builtins: Vec<BuiltinFunction> =
            vec![bf_noop as BuiltinFunction; BUILTINS.number_of()];
        register_bf_values(&mut builtins);
        register_bf_num(&mut builtins);
        register_bf_strings(&mut builtins);
        register_bf_list_sets(&mut builtins);
        register_bf_maps(&mut builtins);
        register_bf_server(&mut builtins);

        BuiltinRegistry { builtins }
    }

    pub(crate) fn call(&self, id: BuiltinId, args: Vec<Var>) -> Result<BfRet, BfErr> {
        let name = BUILTINS.name_of(id).unwrap_or("<unknown>");
        let Some(function) = self.builtins.get(id.0 as usize) else {
            return Err(BfErr::ErrValue(
                E_INVARG.msg(format!("no built-in function #{}", id.0)),
            ));
        };
        let mut bf_args = BfCallState { name, args };
        function(&mut bf_args)
    }
}

/// The arguments and other state passed to a built-in function.
pub(crate) struct BfCallState {
    /// The name of the invoked function.
    pub(crate) name: &'static str,
    /// Arguments passed to the function.
    pub(crate) args: Vec<Var>,
}

pub(crate) type BuiltinFunction = fn(&mut BfCallState) -> Result<BfRet, BfErr>;

/// Return possibilities from a built-in function.
pub(crate) enum BfRet {
    /// Successful return, with a value to be pushed to the value stack.
    Ret(Var),
    /// The function needs the host, e.g. `suspend`.
    Request(HostRequest),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum BfErr {
    #[error("Error in built-in function: {0}")]
    ErrValue(Error),
    /// `raise()` itself.
    #[error("Raised error: {0:?}")]
    Raise(Error),
}

/// Offset of the named builtin in the registry. The table is fixed, so an unknown name is a bug in
/// the registration code.
pub(crate) fn offset_for_builtin(name: &str) -> usize {
    match BUILTINS.find_builtin(name) {
        Some(id) => id.0 as usize,
        None => panic!("unknown builtin: {name}"),
    }
}

fn bf_noop(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    Err(BfErr::ErrValue(E_INVARG.msg(format!(
        "built-in function {}() is not implemented",
        bf_args.name
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_is_registered() {
        for descriptor in &BUILTINS.descriptors {
            let offset = offset_for_builtin(descriptor.name);
            assert!(
                BUILTIN_REGISTRY.builtins[offset] as usize != bf_noop as BuiltinFunction as usize,
                "{} has no implementation",
                descriptor.name
            );
        }
    }
}
