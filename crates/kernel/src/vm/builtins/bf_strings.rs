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
use protocosm_var::{E_TYPE, v_string};

fn string_arg(bf_args: &BfCallState) -> Result<&str, BfErr> {
    bf_args.args[0].as_str().ok_or_else(|| {
        BfErr::ErrValue(E_TYPE.msg(format!("{}() requires a string", bf_args.name)))
    })
}

fn bf_lowercase(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    Ok(Ret(v_string(string_arg(bf_args)?.to_lowercase())))
}

fn bf_uppercase(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    Ok(Ret(v_string(string_arg(bf_args)?.to_uppercase())))
}

pub(crate) fn register_bf_strings(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("lowercase")] = bf_lowercase;
    builtins[offset_for_builtin("uppercase")] = bf_uppercase;
}
