//! Request validation and coercion from the registry's column definitions.

use crate::config::{ColumnDef, ColumnKind, ResourceDef};
use crate::error::AppError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body: every required column present and non-empty, every known
    /// column of the right kind. Returns the body reduced to writable columns, coerced.
    pub fn validate_create(def: &ResourceDef, body: &HashMap<String, Value>) -> Result<HashMap<String, Value>, AppError> {
        for c in def.columns.iter().filter(|c| c.required) {
            if is_blank(body.get(c.name)) {
                return Err(AppError::Validation(format!("{} is required", c.name)));
            }
        }
        Self::coerce(def, body)
    }

    /// Validate only the fields present (PUT keeps omitted columns). Required columns may be
    /// omitted but not blanked. At least one writable column must be present.
    pub fn validate_update(def: &ResourceDef, body: &HashMap<String, Value>) -> Result<HashMap<String, Value>, AppError> {
        for c in def.columns.iter().filter(|c| c.required) {
            if body.contains_key(c.name) && is_blank(body.get(c.name)) {
                return Err(AppError::Validation(format!("{} cannot be empty", c.name)));
            }
        }
        let out = Self::coerce(def, body)?;
        if out.is_empty() {
            return Err(AppError::BadRequest("body has no writable fields".into()));
        }
        Ok(out)
    }

    /// Single flag column update: `{ "<flag>": value }`.
    pub fn validate_flag(def: &ResourceDef, flag: &str, body: &HashMap<String, Value>) -> Result<HashMap<String, Value>, AppError> {
        if !def.flags.contains(&flag) {
            return Err(AppError::NotFound(format!("{}/{}", def.path_segment, flag)));
        }
        let Some(value) = body.get(flag).filter(|v| !v.is_null()) else {
            return Err(AppError::BadRequest(format!("{} is required", flag)));
        };
        let col = def
            .column(flag)
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", def.path_segment, flag)))?;
        let v = coerce_value(col, value)?;
        Ok(HashMap::from([(flag.to_string(), v)]))
    }

    /// Coerce one value to a column's kind.
    pub fn coerce_column(col: &ColumnDef, v: &Value) -> Result<Value, AppError> {
        coerce_value(col, v)
    }

    fn coerce(def: &ResourceDef, body: &HashMap<String, Value>) -> Result<HashMap<String, Value>, AppError> {
        let mut out = HashMap::new();
        for (k, v) in body {
            let Some(col) = def.column(k) else { continue };
            out.insert(k.clone(), coerce_value(col, v)?);
        }
        Ok(out)
    }

    /// Query-string filters: only `allowed` columns, values typed by column kind.
    /// Integer columns with a non-numeric value are rejected.
    pub fn filters(
        def: &ResourceDef,
        params: &HashMap<String, String>,
        allowed: Option<&[&str]>,
    ) -> Result<Vec<(String, Value)>, AppError> {
        let mut out = Vec::new();
        // Registry order keeps the generated SQL stable.
        for col in def.columns {
            if let Some(allowed) = allowed {
                if !allowed.contains(&col.name) {
                    continue;
                }
            }
            let Some(raw) = params.get(col.name) else { continue };
            let v = if col.kind.is_integer() {
                let n: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("{} must be an integer", col.name)))?;
                Value::from(n)
            } else {
                Value::String(raw.clone())
            };
            out.push((col.name.to_string(), v));
        }
        Ok(out)
    }
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn email_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok()).as_ref()
}

/// Whole floats inside the i64 range. `i64::MAX as f64` rounds up to 2^63, hence `<`.
fn integral_f64(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// Integer columns take integers, integral floats or digit strings; text columns take
/// strings or numbers. Null passes through.
fn coerce_value(col: &ColumnDef, v: &Value) -> Result<Value, AppError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let invalid = |what: &str| AppError::Validation(format!("{} must be {}", col.name, what));
    match col.kind {
        ColumnKind::SmallInt | ColumnKind::Int | ColumnKind::BigInt => {
            let n = match v {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
                Value::String(s) if s.trim().is_empty() => return Ok(Value::Null),
                Value::String(s) => s.trim().parse().ok(),
                Value::Bool(b) => Some(i64::from(*b)),
                _ => None,
            }
            .ok_or_else(|| invalid("an integer"))?;
            let in_range = match col.kind {
                ColumnKind::SmallInt => i16::try_from(n).is_ok(),
                ColumnKind::Int => i32::try_from(n).is_ok(),
                _ => true,
            };
            if !in_range {
                return Err(invalid("in range"));
            }
            Ok(Value::from(n))
        }
        ColumnKind::Text => {
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err(invalid("a string")),
            };
            if col.name == "email" && email_re().is_some_and(|re| !re.is_match(s.trim())) {
                return Err(invalid("a valid email"));
            }
            Ok(Value::String(s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BANNER, CEO, CONTACT};
    use serde_json::json;

    fn body(v: Value) -> HashMap<String, Value> {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn create_requires_required_columns() {
        let err = RequestValidator::validate_create(&BANNER, &body(json!({"title": "Hero"}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "user_id is required"));
    }

    #[test]
    fn create_drops_unknown_and_coerces() {
        let out = RequestValidator::validate_create(
            &BANNER,
            &body(json!({"user_id": "4", "type": 2.0, "id": 99, "created_at": "x"})),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out["user_id"], json!(4));
        assert_eq!(out["type"], json!(2));
    }

    #[test]
    fn rejects_wrong_kinds() {
        assert!(RequestValidator::validate_create(&BANNER, &body(json!({"user_id": "abc"}))).is_err());
        assert!(RequestValidator::validate_create(&BANNER, &body(json!({"user_id": 1, "type": 70000}))).is_err());
        assert!(RequestValidator::validate_create(&BANNER, &body(json!({"user_id": 1, "title": ["x"]}))).is_err());
    }

    #[test]
    fn huge_floats_are_not_clamped() {
        let err = RequestValidator::validate_create(&BANNER, &body(json!({"user_id": 1e30}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "user_id must be an integer"));
        assert!(RequestValidator::validate_create(&BANNER, &body(json!({"user_id": -1e19}))).is_err());
        assert!(RequestValidator::validate_create(&BANNER, &body(json!({"user_id": 1.5}))).is_err());
        let out = RequestValidator::validate_create(&BANNER, &body(json!({"user_id": 12.0}))).unwrap();
        assert_eq!(out["user_id"], json!(12));
    }

    #[test]
    fn contact_email_is_checked() {
        let ok = json!({"name": "A", "email": "a@b.co", "message": "hi"});
        assert!(RequestValidator::validate_create(&CONTACT, &body(ok)).is_ok());
        let bad = json!({"name": "A", "email": "nope", "message": "hi"});
        assert!(RequestValidator::validate_create(&CONTACT, &body(bad)).is_err());
    }

    #[test]
    fn update_needs_a_writable_field() {
        let err = RequestValidator::validate_update(&BANNER, &body(json!({"id": 3}))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = RequestValidator::validate_update(&BANNER, &body(json!({"user_id": null}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn flag_must_be_declared_and_present() {
        assert!(matches!(
            RequestValidator::validate_flag(&CEO, "name", &body(json!({"name": "x"}))),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            RequestValidator::validate_flag(&CEO, "publisher", &body(json!({}))),
            Err(AppError::BadRequest(_))
        ));
        let out = RequestValidator::validate_flag(&CEO, "publisher", &body(json!({"publisher": "1"}))).unwrap();
        assert_eq!(out["publisher"], json!(1));
    }

    #[test]
    fn filters_follow_whitelist_and_kind() {
        let params = HashMap::from([
            ("type".to_string(), "2".to_string()),
            ("title".to_string(), "x".to_string()),
        ]);
        let f = RequestValidator::filters(&BANNER, &params, Some(&["type"])).unwrap();
        assert_eq!(f, vec![("type".to_string(), json!(2))]);
        let all = RequestValidator::filters(&BANNER, &params, None).unwrap();
        assert_eq!(all.len(), 2);
        let bad = HashMap::from([("type".to_string(), "big".to_string())]);
        assert!(RequestValidator::filters(&BANNER, &bad, None).is_err());
    }
}
