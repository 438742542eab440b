//! Response envelopes: `{data}` for one item, `{data: [...], meta: {count}}` for lists.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

pub type One<T> = (StatusCode, Json<SuccessOne<T>>);
pub type Many<T> = (StatusCode, Json<SuccessMany<T>>);

pub fn created<T: Serialize>(data: T) -> One<T> {
    (StatusCode::CREATED, Json(SuccessOne { data }))
}

pub fn ok<T: Serialize>(data: T) -> One<T> {
    (StatusCode::OK, Json(SuccessOne { data }))
}

pub fn many<T: Serialize>(data: Vec<T>) -> Many<T> {
    let count = data.len() as u64;
    (StatusCode::OK, Json(SuccessMany { data, meta: MetaCount { count } }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_envelope_counts_items() {
        let (status, Json(body)) = many(vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"data": [{"id": 1}, {"id": 2}], "meta": {"count": 2}})
        );
    }

    #[test]
    fn single_envelope_wraps_data() {
        let (status, Json(body)) = created(json!({"id": 3}));
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"data": {"id": 3}}));
    }
}
