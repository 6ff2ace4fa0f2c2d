//! `data_transform`: projects and renames fields of an object payload.
//!
//! Payload: `{"data": object, "select"?: [string], "rename"?: {string: string}}`.
//! `select` (if present) projects the given keys first; `rename` (if
//! present) is then applied to the projected keys. Result:
//! `{"transformed": object, "field_count": int}`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::{HandlerError, Result};
use crate::registry::TaskHandler;

pub struct DataTransformHandler;

#[async_trait]
impl TaskHandler for DataTransformHandler {
    async fn execute(&self, payload: Value) -> Result<Value> {
        let data = payload
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| HandlerError::InvalidPayload("payload.data must be an object".into()))?;

        let select = match payload.get("select") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| HandlerError::InvalidPayload("payload.select must be a list of strings".into()))
                    })
                    .collect::<Result<Vec<String>>>()?,
            ),
            Some(_) => {
                return Err(HandlerError::InvalidPayload(
                    "payload.select must be a list of strings".into(),
                ))
            }
        };

        let rename = match payload.get("rename") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => {
                let mut out = std::collections::HashMap::with_capacity(map.len());
                for (k, v) in map {
                    let v = v.as_str().ok_or_else(|| {
                        HandlerError::InvalidPayload("payload.rename must be a string->string map".into())
                    })?;
                    out.insert(k.clone(), v.to_string());
                }
                Some(out)
            }
            Some(_) => {
                return Err(HandlerError::InvalidPayload(
                    "payload.rename must be a string->string map".into(),
                ))
            }
        };

        let mut out: Map<String, Value> = data.clone();

        if let Some(select) = select {
            let mut projected = Map::with_capacity(select.len());
            for key in select {
                let value = out.get(&key).cloned().unwrap_or(Value::Null);
                projected.insert(key, value);
            }
            out = projected;
        }

        if let Some(rename) = rename {
            let mut renamed = Map::with_capacity(out.len());
            for (k, v) in out {
                let new_key = rename.get(&k).cloned().unwrap_or(k);
                renamed.insert(new_key, v);
            }
            out = renamed;
        }

        let field_count = out.len();
        Ok(json!({"transformed": Value::Object(out), "field_count": field_count}))
    }
}
