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

use crate::vm::builtins::BfRet::Ret;
use crate::vm::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction, offset_for_builtin};
use protocosm_var::E_TYPE;

/// `list listappend(list l, any value)`
fn bf_listappend(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    let value = bf_args.args[1].clone();
    bf_args.args[0]
        .push(value)
        .map(Ret)
        .map_err(BfErr::ErrValue)
}

/// `list listdelete(list l, int index)`
fn bf_listdelete(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    if bf_args.args[0].as_list().is_none() {
        return Err(BfErr::ErrValue(E_TYPE.msg("listdelete() requires a list")));
    }
    bf_args.args[0]
        .remove_at(&bf_args.args[1])
        .map(Ret)
        .map_err(BfErr::ErrValue)
}

pub(crate) fn register_bf_list_sets(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("listappend")] = bf_listappend;
    builtins[offset_for_builtin("listdelete")] = bf_listdelete;
}
