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

use crate::vm::builtins::{BUILTIN_REGISTRY, BfErr, BfRet};
use crate::vm::frame::{Handler, MethodFrame};
use crate::vm::{ExecutionResult, HostRequest};
use protocosm_compiler::Op;
use protocosm_var::{
    E_INVARG, E_TYPE, E_VARNF, Error, ErrorCode, Obj, Var, Variant, v_bool, v_empty_list,
    v_empty_map, v_int, v_list_iter, v_none,
};

/// Hand `$err` to the frame's innermost handler and carry on from there, or stop the slice with
/// the error if nothing catches it.
macro_rules! raise {
    ( $f:ident, $err:expr ) => {
        match $f.catch($err) {
            Ok(()) => continue,
            Err(err) => return ExecutionResult::Exception(err),
        }
    };
}

macro_rules! binary_var_op {
    ( $f:ident, $op:ident ) => {
        let rhs = $f.pop();
        let lhs = $f.peek_top();
        match lhs.$op(&rhs) {
            Ok(result) => $f.poke(0, result),
            Err(err) => {
                $f.pop();
                raise!($f, err);
            }
        }
    };
}

macro_rules! comparison_op {
    ( $f:ident, $test:ident ) => {
        let rhs = $f.pop();
        let lhs = $f.pop();
        match lhs.compare(&rhs) {
            Ok(ordering) => $f.push(v_bool(ordering.$test())),
            Err(err) => raise!($f, err),
        }
    };
}

impl MethodFrame {
    /// Execute up to `tick_slice` instructions.
    pub fn run(&mut self, tick_slice: usize) -> ExecutionResult {
        let f = self;
        if let Some(error) = f.uncaught.take() {
            return ExecutionResult::Exception(error);
        }

        // Shares the compiled unit, so the opcodes can be borrowed while the frame is mutated.
        let program = f.program.clone();
        let opcodes = program.main_vector();

        let mut tick_count = 0;
        loop {
            if tick_count >= tick_slice {
                return ExecutionResult::Yield;
            }
            tick_count += 1;

            let Some(op) = opcodes.get(f.pc) else {
                return ExecutionResult::Complete(v_none());
            };
            f.pc += 1;

            match op {
                Op::If(label) | Op::Eif(label) | Op::IfQues(label) | Op::While(label) => {
                    let cond = f.pop();
                    if !cond.is_true() {
                        f.jump(label);
                    }
                }
                Op::Jump { label } => f.jump(label),
                Op::ForList {
                    id,
                    list,
                    position,
                    end_label,
                } => {
                    let pos = f.get_env(position).and_then(Var::as_int).unwrap_or(0);
                    let next = match f.get_env(list) {
                        Some(sequence) => match sequence.variant() {
                            Variant::List(l) => Ok(l.get(pos as usize).cloned()),
                            Variant::Map(m) => Ok(m.values().nth(pos as usize).cloned()),
                            _ => Err(E_TYPE.msg(format!(
                                "cannot iterate over {}",
                                sequence.type_code()
                            ))),
                        },
                        None => Err(E_VARNF.msg("loop sequence is unset")),
                    };
                    match next {
                        Ok(Some(v)) => {
                            f.set_env(id, v);
                            f.set_env(position, v_int(pos + 1));
                        }
                        Ok(None) => f.jump(end_label),
                        Err(err) => raise!(f, err),
                    }
                }
                Op::ForRange {
                    id,
                    position,
                    end,
                    end_label,
                } => {
                    let from = f.get_env(position).and_then(Var::as_int);
                    let to = f.get_env(end).and_then(Var::as_int);
                    let (Some(from), Some(to)) = (from, to) else {
                        raise!(f, E_TYPE.msg("range bounds must be integers"));
                    };
                    if from > to {
                        f.jump(end_label);
                    } else {
                        f.set_env(id, v_int(from));
                        match from.checked_add(1) {
                            Some(next) => f.set_env(position, v_int(next)),
                            // This was the last representable value; close the range.
                            None => f.set_env(end, v_int(from - 1)),
                        }
                    }
                }
                Op::Pop => {
                    f.pop();
                }
                Op::ImmNone => f.push(v_none()),
                Op::ImmInt(i) => f.push(v_int(*i)),
                Op::ImmEmptyList => f.push(v_empty_list()),
                Op::ImmEmptyMap => f.push(v_empty_map()),
                Op::Imm(label) => {
                    let literal = program
                        .literal(*label)
                        .cloned()
                        .unwrap_or_else(|| panic!("no literal {} @ PC: {}", label.0, f.pc));
                    f.push(literal);
                }
                Op::MakeSingletonList => {
                    let v = f.pop();
                    f.push(v_list_iter([v]));
                }
                Op::ListAddTail => {
                    let tail = f.pop();
                    let list = f.pop();
                    match list.into_variant() {
                        Variant::List(mut l) => {
                            l.push(tail);
                            f.push(Var::from_variant(Variant::List(l)));
                        }
                        _ => raise!(f, E_TYPE.msg("cannot append to a non-list")),
                    }
                }
                Op::MapInsert => {
                    let value = f.pop();
                    let key = f.pop();
                    let map = f.pop();
                    let Some(key) = key.as_str() else {
                        raise!(f, E_TYPE.msg(format!("map keys must be strings, not {}", key.type_code())));
                    };
                    match map.into_variant() {
                        Variant::Map(mut m) => {
                            m.insert(key.to_string(), value);
                            f.push(Var::from_variant(Variant::Map(m)));
                        }
                        _ => raise!(f, E_TYPE.msg("cannot insert into a non-map")),
                    }
                }
                Op::IndexSet => {
                    let value = f.pop();
                    let index = f.pop();
                    let base = f.pop();
                    match base.index_set(&index, &value) {
                        Ok(v) => f.push(v),
                        Err(err) => raise!(f, err),
                    }
                }
                Op::PutTemp => {
                    f.temp = f.peek_top().clone();
                }
                Op::PushTemp => {
                    let temp = std::mem::replace(&mut f.temp, v_none());
                    f.push(temp);
                }
                Op::Eq => {
                    let rhs = f.pop();
                    let lhs = f.peek_top();
                    let result = v_bool(lhs.eq_value(&rhs));
                    f.poke(0, result);
                }
                Op::Ne => {
                    let rhs = f.pop();
                    let lhs = f.peek_top();
                    let result = v_bool(!lhs.eq_value(&rhs));
                    f.poke(0, result);
                }
                Op::Lt => {
                    comparison_op!(f, is_lt);
                }
                Op::Le => {
                    comparison_op!(f, is_le);
                }
                Op::Gt => {
                    comparison_op!(f, is_gt);
                }
                Op::Ge => {
                    comparison_op!(f, is_ge);
                }
                Op::In => {
                    let container = f.pop();
                    let needle = f.pop();
                    match container.contains(&needle) {
                        Ok(found) => f.push(v_bool(found)),
                        Err(err) => raise!(f, err),
                    }
                }
                Op::Add => {
                    binary_var_op!(f, add);
                }
                Op::Sub => {
                    binary_var_op!(f, sub);
                }
                Op::Mul => {
                    binary_var_op!(f, mul);
                }
                Op::Div => {
                    binary_var_op!(f, div);
                }
                Op::Mod => {
                    binary_var_op!(f, modulus);
                }
                Op::Exp => {
                    binary_var_op!(f, pow);
                }
                Op::And(label) => {
                    if !f.peek_top().is_true() {
                        f.jump(label);
                    } else {
                        f.pop();
                    }
                }
                Op::Or(label) => {
                    if f.peek_top().is_true() {
                        f.jump(label);
                    } else {
                        f.pop();
                    }
                }
                Op::Not => {
                    let v = f.pop();
                    f.push(v_bool(!v.is_true()));
                }
                Op::UnaryMinus => {
                    let v = f.pop();
                    match v.negative() {
                        Ok(v) => f.push(v),
                        Err(err) => raise!(f, err),
                    }
                }
                Op::Ref => {
                    let index = f.pop();
                    let base = f.pop();
                    match base.index(&index) {
                        Ok(v) => f.push(v),
                        Err(err) => raise!(f, err),
                    }
                }
                Op::PushRef => {
                    let (index, base) = f.peek2();
                    match base.index(index) {
                        Ok(v) => f.push(v),
                        Err(err) => raise!(f, err),
                    }
                }
                Op::RangeRef => {
                    let to = f.pop();
                    let from = f.pop();
                    let base = f.pop();
                    match base.range(&from, &to) {
                        Ok(v) => f.push(v),
                        Err(err) => raise!(f, err),
                    }
                }
                Op::Push(name) => match f.get_env(name) {
                    Some(v) => {
                        let v = v.clone();
                        f.push(v);
                    }
                    None => {
                        let var_name = program.var_names().name_of(name).unwrap_or("?");
                        raise!(f, E_VARNF.msg(format!("variable `{var_name}` is not defined")));
                    }
                },
                Op::Put(name) => {
                    let v = f.peek_top().clone();
                    f.set_env(name, v);
                }
                Op::GetProp => {
                    let name = f.pop();
                    let obj = f.pop();
                    match property_target(&obj, &name) {
                        Ok((obj, name)) => {
                            return ExecutionResult::Request(HostRequest::GetProp { obj, name });
                        }
                        Err(err) => raise!(f, err),
                    }
                }
                Op::PushGetProp => {
                    let (name, obj) = f.peek2();
                    match property_target(obj, name) {
                        Ok((obj, name)) => {
                            return ExecutionResult::Request(HostRequest::GetProp { obj, name });
                        }
                        Err(err) => raise!(f, err),
                    }
                }
                Op::PutProp => {
                    let value = f.pop();
                    let name = f.pop();
                    let obj = f.pop();
                    match property_target(&obj, &name) {
                        Ok((obj, name)) => {
                            return ExecutionResult::Request(HostRequest::PutProp {
                                obj,
                                name,
                                value,
                            });
                        }
                        Err(err) => raise!(f, err),
                    }
                }
                Op::CallMethod => {
                    let args = f.pop();
                    let name = f.pop();
                    let obj = f.pop();
                    let Some(obj) = obj.as_obj() else {
                        raise!(f, E_TYPE.msg(format!("cannot call a method on {}", obj.type_code())));
                    };
                    let Some(name) = name.as_str() else {
                        raise!(f, E_TYPE.msg("method names must be strings"));
                    };
                    let name = name.to_string();
                    match into_args(args) {
                        Ok(args) => {
                            return ExecutionResult::Request(HostRequest::CallMethod {
                                obj,
                                name,
                                args,
                            });
                        }
                        Err(err) => raise!(f, err),
                    }
                }
                Op::CallRegistry => {
                    let args = f.pop();
                    let op = f.pop();
                    let Some(op) = op.as_str() else {
                        raise!(f, E_TYPE.msg("registry operations are named by strings"));
                    };
                    let op = op.to_string();
                    match into_args(args) {
                        Ok(args) => {
                            return ExecutionResult::Request(HostRequest::Registry { op, args });
                        }
                        Err(err) => raise!(f, err),
                    }
                }
                Op::PushAlias(label) => {
                    let name = program
                        .literal(*label)
                        .and_then(Var::as_str)
                        .unwrap_or_else(|| panic!("no alias literal {} @ PC: {}", label.0, f.pc));
                    return ExecutionResult::Request(HostRequest::ResolveAlias(name.to_string()));
                }
                Op::FuncCall { id } => {
                    let args = match into_args(f.pop()) {
                        Ok(args) => args,
                        Err(err) => raise!(f, err),
                    };
                    match BUILTIN_REGISTRY.call(*id, args) {
                        Ok(BfRet::Ret(v)) => f.push(v),
                        Ok(BfRet::Request(request)) => return ExecutionResult::Request(request),
                        Err(BfErr::ErrValue(err) | BfErr::Raise(err)) => raise!(f, err),
                    }
                }
                Op::TryExcept { handler } => {
                    let valstack_pos = f.valstack.len();
                    f.handlers.push(Handler {
                        label: *handler,
                        valstack_pos,
                    });
                }
                Op::EndExcept(label) => {
                    f.handlers.pop();
                    f.jump(label);
                }
                Op::ExceptMatch(label) => {
                    let codes = f.pop();
                    let matched = match codes.as_list() {
                        _ if codes.is_none() => true,
                        Some(codes) => codes.iter().any(|c| code_matches(c, f.peek_top())),
                        None => false,
                    };
                    if !matched {
                        f.jump(label);
                    }
                }
                Op::Reraise => {
                    let caught = f.pop();
                    let err = Error::from_var(&caught)
                        .unwrap_or_else(|| E_INVARG.msg("re-raised value is not an error"));
                    raise!(f, err);
                }
                Op::Exit { label, handlers } => {
                    let keep = f.handlers.len().saturating_sub(*handlers as usize);
                    f.handlers.truncate(keep);
                    f.jump(label);
                }
                Op::Return => {
                    let v = f.pop();
                    return ExecutionResult::Complete(v);
                }
                Op::Return0 | Op::Done => return ExecutionResult::Complete(v_none()),
            }
        }
    }
}

fn property_target(obj: &Var, name: &Var) -> Result<(Obj, String), Error> {
    let Some(obj) = obj.as_obj() else {
        return Err(E_TYPE.msg(format!("cannot read a property of {}", obj.type_code())));
    };
    let Some(name) = name.as_str() else {
        return Err(E_TYPE.msg("property names must be strings"));
    };
    Ok((obj, name.to_string()))
}

fn into_args(args: Var) -> Result<Vec<Var>, Error> {
    match args.into_variant() {
        Variant::List(l) => Ok(l),
        _ => Err(E_TYPE.msg("argument list is not a list")),
    }
}

/// Whether one entry of an `except` code list names the code of the caught error value. Entries
/// are code strings, or error values as bound by an outer `except`.
fn code_matches(code: &Var, caught: &Var) -> bool {
    let Some(raised) = caught
        .as_map()
        .and_then(|m| m.get("code"))
        .and_then(Var::as_str)
    else {
        return false;
    };
    let wanted = match code.variant() {
        Variant::Str(s) => s.as_str(),
        Variant::Map(m) => match m.get("code").and_then(Var::as_str) {
            Some(s) => s,
            None => return false,
        },
        _ => return false,
    };
    ErrorCode::parse_str(wanted) == ErrorCode::parse_str(raised)
}
