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

use chrono::{DateTime, Utc};
use protocosm_var::{Obj, SYSTEM_OBJECT, Var};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub type PropertyMap = BTreeMap<String, Var>;
pub type MethodMap = BTreeMap<String, MethodDef>;

/// A method as stored: its source text, plus whatever free-form metadata authoring tools attached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub code: String,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Var>,
}

impl MethodDef {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            metadata: BTreeMap::new(),
        }
    }
}

/// The persisted form of an object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectDocument {
    #[serde(rename = "_id")]
    pub id: Obj,
    #[serde(default = "default_parent")]
    pub parent: Obj,
    #[serde(default, deserialize_with = "lenient_map")]
    pub properties: PropertyMap,
    #[serde(default, deserialize_with = "lenient_map")]
    pub methods: MethodMap,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recycled: bool,
}

fn default_parent() -> Obj {
    SYSTEM_OBJECT
}

impl ObjectDocument {
    pub fn new(id: Obj, parent: Obj) -> Self {
        let now = Utc::now();
        Self {
            id,
            parent,
            properties: PropertyMap::new(),
            methods: MethodMap::new(),
            created: now,
            modified: now,
            recycled: false,
        }
    }

    pub fn with_property(mut self, name: &str, value: Var) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    pub fn with_method(mut self, name: &str, code: &str) -> Self {
        self.methods.insert(name.to_string(), MethodDef::new(code));
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Map(BTreeMap<String, T>),
    Malformed(serde::de::IgnoredAny),
}

/// A property or method map that is null, missing or of the wrong shape reads as empty, so that
/// one corrupt document degrades to "no definitions" instead of failing every lookup through it.
fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Map(map) => Ok(map),
        Lenient::Malformed(_) => {
            warn!("Malformed definition map in stored document; treating as empty");
            Ok(BTreeMap::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use protocosm_var::{v_int, v_objid, v_str};
    use serde_json::json;

    #[test]
    fn test_document_wire_shape() {
        let doc = ObjectDocument::new(Obj::mk_id(5), Obj::mk_id(1))
            .with_property("owner", v_objid(3))
            .with_method("greet", "return \"Hello\";");
        let encoded = serde_json::to_value(&doc).unwrap();
        assert_eq!(encoded["_id"], json!(5));
        assert_eq!(encoded["parent"], json!(1));
        assert_eq!(encoded["properties"]["owner"], json!({"objref": 3}));
        assert_eq!(encoded["methods"]["greet"]["code"], json!("return \"Hello\";"));
        assert!(encoded.get("recycled").is_none());

        let decoded: ObjectDocument = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_null_and_malformed_maps_read_as_empty() {
        let decoded: ObjectDocument = serde_json::from_value(json!({
            "_id": 7,
            "parent": 1,
            "properties": null,
            "methods": "garbage",
            "created": "2024-01-01T00:00:00Z",
            "modified": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(decoded.properties.is_empty());
        assert!(decoded.methods.is_empty());
        assert!(!decoded.recycled);
    }

    #[test]
    fn test_missing_fields_default() {
        let decoded: ObjectDocument = serde_json::from_value(json!({"_id": 9})).unwrap();
        assert_eq!(decoded.parent, SYSTEM_OBJECT);
        assert!(decoded.properties.is_empty());
    }

    #[test]
    fn test_method_metadata_is_kept() {
        let def: MethodDef = serde_json::from_value(json!({
            "code": "return 1;",
            "author": "ryan",
            "revision": 3
        }))
        .unwrap();
        assert_eq!(def.code, "return 1;");
        assert_eq!(def.metadata.get("author"), Some(&v_str("ryan")));
        assert_eq!(def.metadata.get("revision"), Some(&v_int(3)));
    }
}
