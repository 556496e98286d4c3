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
use protocosm_var::{E_TYPE, Map, v_list_iter, v_str};

fn map_arg(bf_args: &BfCallState) -> Result<&Map, BfErr> {
    bf_args.args[0].as_map().ok_or_else(|| {
        BfErr::ErrValue(E_TYPE.msg(format!("{}() requires a map", bf_args.name)))
    })
}

/// `list keys(map m)`, in key order.
fn bf_keys(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    let map = map_arg(bf_args)?;
    Ok(Ret(v_list_iter(map.keys().map(|k| v_str(k)))))
}

/// `list values(map m)`, in key order.
fn bf_values(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    let map = map_arg(bf_args)?;
    Ok(Ret(v_list_iter(map.values().cloned())))
}

/// `map mapdelete(map m, str key)`. Deleting an absent key is not an error.
fn bf_mapdelete(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    map_arg(bf_args)?;
    bf_args.args[0]
        .remove_at(&bf_args.args[1])
        .map(Ret)
        .map_err(BfErr::ErrValue)
}

pub(crate) fn register_bf_maps(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("keys")] = bf_keys;
    builtins[offset_for_builtin("values")] = bf_values;
    builtins[offset_for_builtin("mapdelete")] = bf_mapdelete;
}
