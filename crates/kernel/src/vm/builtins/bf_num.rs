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
use protocosm_var::{E_TYPE, Var, Variant, v_float, v_int};
use std::cmp::Ordering;

fn bf_abs(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_int(i.wrapping_abs()))),
        Variant::Float(f) => Ok(Ret(v_float(f.abs()))),
        _ => Err(BfErr::ErrValue(E_TYPE.msg("abs() requires a number"))),
    }
}

/// Pick the argument that wins `keep` against every other; all arguments must be numbers.
fn extremum(bf_args: &BfCallState, keep: Ordering) -> Result<BfRet, BfErr> {
    let mut best: Option<&Var> = None;
    for arg in &bf_args.args {
        if !matches!(arg.variant(), Variant::Int(_) | Variant::Float(_)) {
            return Err(BfErr::ErrValue(E_TYPE.msg(format!(
                "{}() requires numbers, got {}",
                bf_args.name,
                arg.type_code()
            ))));
        }
        let replace = match best {
            Some(current) => arg.compare(current).map_err(BfErr::ErrValue)? == keep,
            None => true,
        };
        if replace {
            best = Some(arg);
        }
    }
    Ok(Ret(best.cloned().unwrap_or_else(|| v_int(0))))
}

fn bf_min(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    extremum(bf_args, Ordering::Less)
}

fn bf_max(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    extremum(bf_args, Ordering::Greater)
}

pub(crate) fn register_bf_num(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("abs")] = bf_abs;
    builtins[offset_for_builtin("min")] = bf_min;
    builtins[offset_for_builtin("max")] = bf_max;
}
