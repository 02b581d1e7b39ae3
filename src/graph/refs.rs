//! Reference extraction from template property trees.
//!
//! A property tree may point at other template entries through intrinsic
//! functions. We recognise the two that create dependencies:
//! - `{"Ref": "Id"}`
//! - `{"Fn::GetAtt": ["Id", "Attr"]}` or `{"Fn::GetAtt": "Id.Attr"}`

use serde_json::{Value, json};
use std::collections::BTreeSet;

pub const PSEUDO_PREFIX: &str = "AWS::";

/// Every id referenced anywhere in `value`, pseudo parameters included.
pub fn collect_refs(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    walk(value, &mut out);
    out
}

fn walk(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("Ref") {
                    out.insert(id.clone());
                    return;
                }
                if let Some(att) = map.get("Fn::GetAtt") {
                    match att {
                        Value::Array(parts) => {
                            if let Some(Value::String(id)) = parts.first() {
                                out.insert(id.clone());
                            }
                        }
                        Value::String(dotted) => {
                            let id = dotted.split_once('.').map_or(dotted.as_str(), |(id, _)| id);
                            out.insert(id.to_string());
                        }
                        _ => {}
                    }
                    return;
                }
            }
            for v in map.values() {
                walk(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                walk(v, out);
            }
        }
        _ => {}
    }
}

pub fn is_pseudo(id: &str) -> bool {
    id.starts_with(PSEUDO_PREFIX)
}

/// `{"Ref": "AWS::<name>"}`.
pub fn pseudo(name: &str) -> Value {
    json!({ "Ref": format!("{}{}", PSEUDO_PREFIX, name) })
}

/// `{"Fn::Join": ["", parts]}`.
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}
