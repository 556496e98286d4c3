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

//! Builtin functions that reach outside the value world: raising errors, the clock, and giving up
//! the thread.

use crate::vm::HostRequest;
use crate::vm::builtins::BfRet::{Request, Ret};
use crate::vm::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction, offset_for_builtin};
use protocosm_var::{E_INVARG, E_TYPE, Error, ErrorCode, Variant, v_int};
use std::time::Duration;

/// `raise(str code [, str message [, any value]])`, or `raise(error)` with an error value bound by
/// an `except` arm.
fn bf_raise(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    let err = match bf_args.args[0].variant() {
        Variant::Str(code) => {
            let msg = bf_args.args.get(1).map(|m| m.as_display_string());
            let value = bf_args.args.get(2).cloned();
            Error::new(ErrorCode::parse_str(code), msg, value)
        }
        Variant::Map(_) => match Error::from_var(&bf_args.args[0]) {
            Some(err) => err,
            None => {
                return Err(BfErr::ErrValue(
                    E_INVARG.msg("raise() given a map that is not an error value"),
                ));
            }
        },
        _ => {
            return Err(BfErr::ErrValue(
                E_TYPE.msg("raise() requires an error code string"),
            ));
        }
    };
    Err(BfErr::Raise(err))
}

/// `int time()`: seconds since the Unix epoch.
fn bf_time(_bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(chrono::Utc::now().timestamp())))
}

/// `suspend([num seconds])`. Without an argument, only yields to other tasks.
fn bf_suspend(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    let seconds = match bf_args.args.first().map(|a| a.variant()) {
        None => 0.0,
        Some(Variant::Int(i)) => *i as f64,
        Some(Variant::Float(f)) => *f,
        Some(_) => {
            return Err(BfErr::ErrValue(
                E_TYPE.msg("suspend() requires a number of seconds"),
            ));
        }
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(BfErr::ErrValue(
            E_INVARG.msg(format!("cannot suspend for {seconds} seconds")),
        ));
    }
    Ok(Request(HostRequest::Suspend(Duration::from_secs_f64(seconds))))
}

pub(crate) fn register_bf_server(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("raise")] = bf_raise;
    builtins[offset_for_builtin("time")] = bf_time;
    builtins[offset_for_builtin("suspend")] = bf_suspend;
}
