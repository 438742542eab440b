//! HTTP handlers: generic resources, products, gallery upload, access, contact.

pub mod access;
pub mod contact;
pub mod gallery;
pub mod product;
pub mod resource;

use crate::error::AppError;
use serde_json::Value;
use std::collections::HashMap;

pub(crate) fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| AppError::BadRequest(format!("invalid id: {}", id_str)))
}

pub(crate) fn body_to_map(value: Value) -> Result<HashMap<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// `limit` / `offset` query values; anything unparsable is ignored.
pub(crate) fn page(params: &HashMap<String, String>) -> (Option<u32>, Option<u32>) {
    let get = |k: &str| params.get(k).and_then(|v| v.trim().parse().ok());
    (get("limit"), get("offset"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_positive_integers() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("0").is_err());
        assert!(parse_id("abc").is_err());
    }

    #[test]
    fn body_must_be_object() {
        assert!(body_to_map(json!([1])).is_err());
        assert_eq!(body_to_map(json!({"a": 1})).unwrap().len(), 1);
    }

    #[test]
    fn page_ignores_garbage() {
        let p = HashMap::from([("limit".to_string(), "5".to_string()), ("offset".to_string(), "x".to_string())]);
        assert_eq!(page(&p), (Some(5), None));
    }
}
