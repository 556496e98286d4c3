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

use crate::error::{Error, ErrorCode::*};
use crate::variant::{Map, Variant};
use crate::{Obj, VarType};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

#[derive(Clone, PartialEq)]
pub struct Var(Variant);

impl Debug for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_literal())
    }
}

impl Default for Var {
    fn default() -> Self {
        v_none()
    }
}

impl Var {
    pub fn from_variant(variant: Variant) -> Self {
        Self(variant)
    }

    pub fn variant(&self) -> &Variant {
        &self.0
    }

    pub fn into_variant(self) -> Variant {
        self.0
    }

    pub fn type_code(&self) -> VarType {
        match self.variant() {
            Variant::None => VarType::TYPE_NONE,
            Variant::Bool(_) => VarType::TYPE_BOOL,
            Variant::Obj(_) => VarType::TYPE_OBJ,
            Variant::Int(_) => VarType::TYPE_INT,
            Variant::Float(_) => VarType::TYPE_FLOAT,
            Variant::Str(_) => VarType::TYPE_STR,
            Variant::List(_) => VarType::TYPE_LIST,
            Variant::Map(_) => VarType::TYPE_MAP,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self.variant(), Variant::None)
    }

    pub fn is_true(&self) -> bool {
        match self.variant() {
            Variant::None => false,
            Variant::Bool(b) => *b,
            Variant::Obj(_) => true,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::Str(s) => !s.is_empty(),
            Variant::List(l) => !l.is_empty(),
            Variant::Map(m) => !m.is_empty(),
        }
    }

    pub fn as_obj(&self) -> Option<Obj> {
        match self.variant() {
            Variant::Obj(o) => Some(*o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.variant() {
            Variant::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.variant() {
            Variant::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Var]> {
        match self.variant() {
            Variant::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self.variant() {
            Variant::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn len(&self) -> Result<usize, Error> {
        match self.variant() {
            Variant::Str(s) => Ok(s.chars().count()),
            Variant::List(l) => Ok(l.len()),
            Variant::Map(m) => Ok(m.len()),
            _ => Err(E_TYPE.msg(format!("{} has no length", self.type_code()))),
        }
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Index into a list or string (1-based), or look up a key in a map.
    pub fn index(&self, index: &Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::List(l) => {
                let i = position(index, l.len())?;
                Ok(l[i].clone())
            }
            Variant::Str(s) => {
                let i = position(index, s.chars().count())?;
                let c = s.chars().nth(i).ok_or_else(|| Error::from(E_RANGE))?;
                Ok(v_string(c.to_string()))
            }
            Variant::Map(m) => {
                let key = map_key(index)?;
                m.get(key)
                    .cloned()
                    .ok_or_else(|| E_RANGE.msg(format!("key {key:?} not found")))
            }
            _ => Err(E_TYPE.msg(format!("cannot index {}", self.type_code()))),
        }
    }

    /// Return a copy with the element at `index` (1-based) or key replaced by `value`.
    pub fn index_set(&self, index: &Var, value: &Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::List(l) => {
                let i = position(index, l.len())?;
                let mut l = l.clone();
                l[i] = value.clone();
                Ok(v_list_iter(l))
            }
            Variant::Map(m) => {
                let key = map_key(index)?;
                let mut m = m.clone();
                m.insert(key.to_string(), value.clone());
                Ok(Var(Variant::Map(m)))
            }
            _ => Err(E_TYPE.msg(format!("cannot assign into {}", self.type_code()))),
        }
    }

    /// Inclusive 1-based range. A range whose end precedes its start is empty.
    pub fn range(&self, from: &Var, to: &Var) -> Result<Var, Error> {
        let (Some(from), Some(to)) = (from.as_int(), to.as_int()) else {
            return Err(E_TYPE.msg("range bounds must be integers"));
        };
        let len = self.len()? as i64;
        if to < from {
            return Ok(match self.variant() {
                Variant::Str(_) => v_str(""),
                _ => v_empty_list(),
            });
        }
        if from < 1 || to > len {
            return Err(E_RANGE.msg(format!("range [{from}..{to}] out of bounds")));
        }
        let (start, count) = ((from - 1) as usize, (to - from + 1) as usize);
        match self.variant() {
            Variant::List(l) => Ok(v_list(&l[start..start + count])),
            Variant::Str(s) => Ok(v_string(s.chars().skip(start).take(count).collect())),
            _ => Err(E_TYPE.msg(format!("cannot take a range of {}", self.type_code()))),
        }
    }

    /// `needle in self`: list membership, substring, or map key presence.
    pub fn contains(&self, needle: &Var) -> Result<bool, Error> {
        match self.variant() {
            Variant::List(l) => Ok(l.iter().any(|v| v.eq_value(needle))),
            Variant::Str(s) => match needle.variant() {
                Variant::Str(n) => Ok(s.contains(n.as_str())),
                _ => Err(E_TYPE.msg("substring test requires a string")),
            },
            Variant::Map(m) => Ok(m.contains_key(map_key(needle)?)),
            _ => Err(E_TYPE.msg(format!("cannot search {}", self.type_code()))),
        }
    }

    pub fn push(&self, value: Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::List(l) => {
                let mut l = l.clone();
                l.push(value);
                Ok(v_list_iter(l))
            }
            _ => Err(E_TYPE.msg(format!("cannot append to {}", self.type_code()))),
        }
    }

    pub fn remove_at(&self, index: &Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::List(l) => {
                let i = position(index, l.len())?;
                let mut l = l.clone();
                l.remove(i);
                Ok(v_list_iter(l))
            }
            Variant::Map(m) => {
                let key = map_key(index)?;
                let mut m = m.clone();
                m.remove(key);
                Ok(Var(Variant::Map(m)))
            }
            _ => Err(E_TYPE.msg(format!("cannot remove from {}", self.type_code()))),
        }
    }

    /// Equality as seen by method code: integers and floats compare numerically.
    pub fn eq_value(&self, other: &Var) -> bool {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Float(r)) => (*l as f64) == *r,
            (Variant::Float(l), Variant::Int(r)) => *l == (*r as f64),
            _ => self == other,
        }
    }

    pub fn compare(&self, other: &Var) -> Result<Ordering, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(l.cmp(r)),
            (Variant::Str(l), Variant::Str(r)) => Ok(l.cmp(r)),
            (Variant::Obj(l), Variant::Obj(r)) => Ok(l.cmp(r)),
            (Variant::Bool(l), Variant::Bool(r)) => Ok(l.cmp(r)),
            _ => match (self.as_number(), other.as_number()) {
                (Some(l), Some(r)) => Ok(l.total_cmp(&r)),
                _ => Err(E_TYPE.msg(format!(
                    "cannot compare {} with {}",
                    self.type_code(),
                    other.type_code()
                ))),
            },
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self.variant() {
            Variant::Int(i) => Some(*i as f64),
            Variant::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn arith(
        &self,
        other: &Var,
        op: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => int_op(*l, *r)
                .map(v_int)
                .ok_or_else(|| E_RANGE.msg(format!("integer overflow in {l} {op} {r}"))),
            _ => match (self.as_number(), other.as_number()) {
                (Some(l), Some(r)) => Ok(v_float(float_op(l, r))),
                _ => Err(E_TYPE.msg(format!(
                    "cannot apply {op} to {} and {}",
                    self.type_code(),
                    other.type_code()
                ))),
            },
        }
    }

    pub fn add(&self, other: &Var) -> Result<Var, Error> {
        if let (Variant::Str(l), Variant::Str(r)) = (self.variant(), other.variant()) {
            return Ok(v_string(format!("{l}{r}")));
        }
        self.arith(other, "+", i64::checked_add, |l, r| l + r)
    }

    pub fn sub(&self, other: &Var) -> Result<Var, Error> {
        self.arith(other, "-", i64::checked_sub, |l, r| l - r)
    }

    pub fn mul(&self, other: &Var) -> Result<Var, Error> {
        self.arith(other, "*", i64::checked_mul, |l, r| l * r)
    }

    pub fn div(&self, other: &Var) -> Result<Var, Error> {
        if other.as_number() == Some(0.0) {
            return Err(E_DIV.msg("division by zero"));
        }
        self.arith(other, "/", i64::checked_div, |l, r| l / r)
    }

    pub fn modulus(&self, other: &Var) -> Result<Var, Error> {
        if other.as_number() == Some(0.0) {
            return Err(E_DIV.msg("modulus by zero"));
        }
        self.arith(other, "%", i64::checked_rem, |l, r| l % r)
    }

    pub fn pow(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(base), Variant::Int(exp)) if *exp >= 0 => {
                let exp = u32::try_from(*exp).map_err(|_| E_RANGE.msg("exponent too large"))?;
                base.checked_pow(exp)
                    .map(v_int)
                    .ok_or_else(|| E_RANGE.msg("integer overflow in ^"))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(l), Some(r)) => Ok(v_float(l.powf(r))),
                _ => Err(E_TYPE.msg(format!(
                    "cannot apply ^ to {} and {}",
                    self.type_code(),
                    other.type_code()
                ))),
            },
        }
    }

    pub fn negative(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Int(i) => i
                .checked_neg()
                .map(v_int)
                .ok_or_else(|| E_RANGE.msg("integer overflow in negation")),
            Variant::Float(f) => Ok(v_float(-f)),
            _ => Err(E_TYPE.msg(format!("cannot negate {}", self.type_code()))),
        }
    }

    /// Render as a literal that the method language would read back to the same value.
    pub fn to_literal(&self) -> String {
        match self.variant() {
            Variant::None => "null".to_string(),
            Variant::Bool(b) => b.to_string(),
            Variant::Obj(o) => o.to_literal(),
            Variant::Int(i) => i.to_string(),
            Variant::Float(f) => format!("{f:?}"),
            Variant::Str(s) => quote_str(s),
            Variant::List(l) => {
                let items: Vec<_> = l.iter().map(|v| v.to_literal()).collect();
                format!("{{{}}}", items.join(", "))
            }
            Variant::Map(m) => {
                let items: Vec<_> = m
                    .iter()
                    .map(|(k, v)| format!("{} -> {}", quote_str(k), v.to_literal()))
                    .collect();
                format!("[{}]", items.join(", "))
            }
        }
    }

    /// Strings render raw, everything else as a literal.
    pub fn as_display_string(&self) -> String {
        match self.variant() {
            Variant::Str(s) => s.clone(),
            _ => self.to_literal(),
        }
    }

    /// Every object reference held by this value, however deeply nested. Plain numbers are never
    /// mistaken for references.
    pub fn object_refs(&self) -> Vec<Obj> {
        let mut refs = vec![];
        self.collect_object_refs(&mut refs);
        refs
    }

    fn collect_object_refs(&self, refs: &mut Vec<Obj>) {
        match self.variant() {
            Variant::Obj(o) => refs.push(*o),
            Variant::List(l) => l.iter().for_each(|v| v.collect_object_refs(refs)),
            Variant::Map(m) => m.values().for_each(|v| v.collect_object_refs(refs)),
            _ => {}
        }
    }
}

fn position(index: &Var, len: usize) -> Result<usize, Error> {
    let Some(i) = index.as_int() else {
        return Err(E_TYPE.msg(format!("index must be an integer, got {}", index.type_code())));
    };
    if i < 1 || i as usize > len {
        return Err(E_RANGE.msg(format!("index {i} out of range (length {len})")));
    }
    Ok((i - 1) as usize)
}

fn map_key(key: &Var) -> Result<&str, Error> {
    key.as_str()
        .ok_or_else(|| E_TYPE.msg(format!("map keys must be strings, got {}", key.type_code())))
}

fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn v_none() -> Var {
    Var(Variant::None)
}

pub fn v_bool(b: bool) -> Var {
    Var(Variant::Bool(b))
}

pub fn v_int(i: i64) -> Var {
    Var(Variant::Int(i))
}

pub fn v_float(f: f64) -> Var {
    Var(Variant::Float(f))
}

pub fn v_str(s: &str) -> Var {
    Var(Variant::Str(s.to_string()))
}

pub fn v_string(s: String) -> Var {
    Var(Variant::Str(s))
}

pub fn v_obj(o: Obj) -> Var {
    Var(Variant::Obj(o))
}

pub fn v_objid(id: i64) -> Var {
    Var(Variant::Obj(Obj::mk_id(id)))
}

pub fn v_list(values: &[Var]) -> Var {
    Var(Variant::List(values.to_vec()))
}

pub fn v_list_iter<IT: IntoIterator<Item = Var>>(values: IT) -> Var {
    Var(Variant::List(values.into_iter().collect()))
}

pub fn v_empty_list() -> Var {
    Var(Variant::List(vec![]))
}

pub fn v_map(map: Map) -> Var {
    Var(Variant::Map(map))
}

pub fn v_map_iter<I: IntoIterator<Item = (String, Var)>>(pairs: I) -> Var {
    Var(Variant::Map(pairs.into_iter().collect()))
}

pub fn v_empty_map() -> Var {
    Var(Variant::Map(Map::new()))
}

impl From<i64> for Var {
    fn from(i: i64) -> Self {
        v_int(i)
    }
}

impl From<f64> for Var {
    fn from(f: f64) -> Self {
        v_float(f)
    }
}

impl From<bool> for Var {
    fn from(b: bool) -> Self {
        v_bool(b)
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        v_str(s)
    }
}

impl From<String> for Var {
    fn from(s: String) -> Self {
        v_string(s)
    }
}

impl From<Obj> for Var {
    fn from(o: Obj) -> Self {
        v_obj(o)
    }
}

impl From<Vec<Var>> for Var {
    fn from(l: Vec<Var>) -> Self {
        v_list_iter(l)
    }
}

impl From<Map> for Var {
    fn from(m: Map) -> Self {
        v_map(m)
    }
}
