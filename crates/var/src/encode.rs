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

//! Self-describing encoding of values for persisted documents.
//!
//! Object references are written as a single-key map `{"objref": n}` so that a reference can never
//! be confused with a plain number when a document is read back.

use crate::Obj;
use crate::var::Var;
use crate::variant::{Map, Variant};
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Formatter;

pub const OBJREF_TAG: &str = "objref";

impl Serialize for Var {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.variant() {
            Variant::None => serializer.serialize_unit(),
            Variant::Bool(b) => serializer.serialize_bool(*b),
            Variant::Int(i) => serializer.serialize_i64(*i),
            Variant::Float(f) => serializer.serialize_f64(*f),
            Variant::Str(s) => serializer.serialize_str(s),
            Variant::Obj(o) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(OBJREF_TAG, &o.id())?;
                map.end()
            }
            Variant::List(l) => {
                let mut seq = serializer.serialize_seq(Some(l.len()))?;
                for v in l {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Variant::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct VarVisitor;

impl<'de> Visitor<'de> for VarVisitor {
    type Value = Var;

    fn expecting(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str("a typed value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Var, E> {
        Ok(Var::from_variant(Variant::Bool(v)))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Var, E> {
        Ok(Var::from_variant(Variant::Int(v)))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Var, E> {
        i64::try_from(v)
            .map(|i| Var::from_variant(Variant::Int(i)))
            .map_err(|_| E::custom(format!("integer {v} out of range")))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Var, E> {
        Ok(Var::from_variant(Variant::Float(v)))
    }

    fn visit_str<E>(self, v: &str) -> Result<Var, E> {
        Ok(Var::from_variant(Variant::Str(v.to_string())))
    }

    fn visit_string<E>(self, v: String) -> Result<Var, E> {
        Ok(Var::from_variant(Variant::Str(v)))
    }

    fn visit_unit<E>(self) -> Result<Var, E> {
        Ok(Var::from_variant(Variant::None))
    }

    fn visit_none<E>(self) -> Result<Var, E> {
        Ok(Var::from_variant(Variant::None))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Var, D::Error> {
        Var::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Var, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Var>()? {
            items.push(item);
        }
        Ok(Var::from_variant(Variant::List(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Var, A::Error> {
        let mut map = Map::new();
        while let Some((k, v)) = access.next_entry::<String, Var>()? {
            map.insert(k, v);
        }
        if map.len() == 1
            && let Some(id) = map.get(OBJREF_TAG).and_then(|v| v.as_int())
        {
            return Ok(Var::from_variant(Variant::Obj(Obj::mk_id(id))));
        }
        Ok(Var::from_variant(Variant::Map(map)))
    }
}

impl<'de> Deserialize<'de> for Var {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VarVisitor)
    }
}
