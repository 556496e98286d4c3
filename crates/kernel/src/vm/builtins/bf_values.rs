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

//! Builtin functions for value inspection and conversion.

use crate::vm::builtins::BfRet::Ret;
use crate::vm::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction, offset_for_builtin};
use protocosm_var::{E_ARGS, E_INVARG, Variant, v_float, v_int, v_str, v_string};

/// `int length(str|list|map value)`
fn bf_length(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    if bf_args.args.len() != 1 {
        return Err(BfErr::ErrValue(
            E_ARGS.msg("length() requires exactly 1 argument"),
        ));
    }

    match bf_args.args[0].len() {
        Ok(l) => Ok(Ret(v_int(l as i64))),
        Err(e) => Err(BfErr::ErrValue(e)),
    }
}

/// `str tostr(any ...)`
/// Concatenates the display form of each argument.
fn bf_tostr(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    let mut result = String::new();
    for arg in bf_args.args.iter() {
        result.push_str(&arg.as_display_string());
    }
    Ok(Ret(v_string(result)))
}

/// `int toint(num|obj|str|bool value)`
/// Floats truncate; strings that do not parse as a number convert to 0.
fn bf_toint(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_int(*i))),
        Variant::Float(f) => Ok(Ret(v_int(*f as i64))),
        Variant::Obj(o) => Ok(Ret(v_int(o.id()))),
        Variant::Bool(b) => Ok(Ret(v_int(*b as i64))),
        Variant::Str(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Ok(Ret(v_int(i))),
                Err(_) => Ok(Ret(v_int(s.parse::<f64>().map(|f| f as i64).unwrap_or(0)))),
            }
        }
        _ => Err(BfErr::ErrValue(
            E_INVARG.msg("cannot convert this type to integer"),
        )),
    }
}

/// `float tofloat(num|str value)`
fn bf_tofloat(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_float(*i as f64))),
        Variant::Float(f) => Ok(Ret(v_float(*f))),
        Variant::Str(s) => match s.trim().parse::<f64>() {
            Ok(f) => Ok(Ret(v_float(f))),
            Err(_) => Err(BfErr::ErrValue(
                E_INVARG.msg(format!("{s:?} is not a number")),
            )),
        },
        _ => Err(BfErr::ErrValue(
            E_INVARG.msg("cannot convert this type to float"),
        )),
    }
}

/// `str toliteral(any value)`
fn bf_toliteral(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    Ok(Ret(v_string(bf_args.args[0].to_literal())))
}

/// `str typeof(any value)`
/// One of `null`, `boolean`, `number`, `string`, `objref`, `array`, `object`.
fn bf_typeof(bf_args: &mut BfCallState) -> Result<BfRet, BfErr> {
    Ok(Ret(v_str(bf_args.args[0].type_code().to_literal())))
}

pub(crate) fn register_bf_values(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("length")] = bf_length;
    builtins[offset_for_builtin("tostr")] = bf_tostr;
    builtins[offset_for_builtin("toint")] = bf_toint;
    builtins[offset_for_builtin("tofloat")] = bf_tofloat;
    builtins[offset_for_builtin("toliteral")] = bf_toliteral;
    builtins[offset_for_builtin("typeof")] = bf_typeof;
}

#[cfg(test)]
mod tests {
    use crate::vm::builtins::{BUILTIN_REGISTRY, BfErr, BfRet};
    use protocosm_compiler::BUILTINS;
    use protocosm_var::{
        E_INVARG, Var, v_bool, v_float, v_int, v_list, v_none, v_objid, v_str,
    };
    use test_case::test_case;

    fn call(name: &str, args: Vec<Var>) -> Result<Var, BfErr> {
        let id = BUILTINS.find_builtin(name).unwrap();
        match BUILTIN_REGISTRY.call(id, args)? {
            BfRet::Ret(v) => Ok(v),
            BfRet::Request(r) => panic!("unexpected host request {r:?}"),
        }
    }

    #[test_case(v_str("42"), v_int(42); "integer string")]
    #[test_case(v_str(" 2.9 "), v_int(2); "float string truncates")]
    #[test_case(v_str("abc"), v_int(0); "garbage is zero")]
    #[test_case(v_float(-3.7), v_int(-3); "float")]
    #[test_case(v_objid(12), v_int(12); "object")]
    #[test_case(v_bool(true), v_int(1); "boolean")]
    fn test_toint(input: Var, expected: Var) {
        assert_eq!(call("toint", vec![input]).unwrap(), expected);
    }

    #[test]
    fn test_tofloat_rejects_garbage() {
        assert_eq!(call("tofloat", vec![v_str("1.5")]).unwrap(), v_float(1.5));
        let Err(BfErr::ErrValue(e)) = call("tofloat", vec![v_str("abc")]) else {
            panic!("expected an error");
        };
        assert_eq!(e.err_type, E_INVARG);
    }

    #[test]
    fn test_length_typeof_tostr() {
        assert_eq!(
            call("length", vec![v_list(&[v_int(1), v_int(2)])]).unwrap(),
            v_int(2)
        );
        assert_eq!(call("typeof", vec![v_objid(1)]).unwrap(), v_str("objref"));
        assert_eq!(call("typeof", vec![v_none()]).unwrap(), v_str("null"));
        assert_eq!(
            call("tostr", vec![v_str("hp: "), v_int(50)]).unwrap(),
            v_str("hp: 50")
        );
        assert_eq!(call("toliteral", vec![v_str("a")]).unwrap(), v_str("\"a\""));
    }
}
