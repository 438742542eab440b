//! Re-nests flat LEFT JOIN rows into parent resources with child collections.
//!
//! A join of one parent table with several child tables yields one row per
//! (parent, child_a, child_b, ...) combination. [`assemble`] walks those rows
//! once and rebuilds the hierarchy: one [`Resource`] per distinct parent id in
//! first-seen order, each relation deduplicated on its own child id.

use crate::error::AssembleError;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One flat result row: column name -> value.
pub type JoinRow = Map<String, Value>;

/// Copy `column` from the row into the output object under `key`.
#[derive(Clone, Copy, Debug)]
pub struct FieldMap {
    pub column: &'static str,
    pub key: &'static str,
}

impl FieldMap {
    pub const fn same(name: &'static str) -> Self {
        FieldMap { column: name, key: name }
    }

    pub const fn renamed(column: &'static str, key: &'static str) -> Self {
        FieldMap { column, key }
    }
}

/// How a child is rendered inside its collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildShape {
    /// `{ id_key: <child id>, ...fields }`
    Object,
    /// Just the child id.
    Identifier,
}

/// One child relation flattened into the join.
#[derive(Clone, Copy, Debug)]
pub struct RelationSpec {
    /// Output key of the collection (e.g. "images").
    pub name: &'static str,
    /// Column carrying the child's own id; null means "no child on this row".
    pub child_id: &'static str,
    /// Output key for the child id when shape is `Object`.
    pub id_key: &'static str,
    pub fields: &'static [FieldMap],
    pub shape: ChildShape,
}

/// Declarative description of one join result.
#[derive(Clone, Copy, Debug)]
pub struct AssemblySpec {
    /// Column carrying the parent's id. Required on every row.
    pub parent_id: &'static str,
    /// Output key for the parent id.
    pub id_key: &'static str,
    /// Parent scalar columns, taken from the first row seen for each parent.
    pub fields: &'static [FieldMap],
    pub relations: &'static [RelationSpec],
}

/// Assembled parent. Serializes as a flat JSON object: scalar fields first, then one array per relation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resource {
    #[serde(skip)]
    pub id: Value,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(flatten)]
    pub relations: IndexMap<String, Vec<Value>>,
}

impl Resource {
    pub fn into_json(self) -> Value {
        let mut obj = self.fields;
        for (name, children) in self.relations {
            obj.insert(name, Value::Array(children));
        }
        Value::Object(obj)
    }

    pub fn children(&self, relation: &str) -> &[Value] {
        self.relations.get(relation).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Per-parent accumulator: the resource plus the child ids already placed, one set per relation.
struct Slot {
    resource: Resource,
    seen: Vec<HashSet<String>>,
}

/// Hashable identity of a JSON scalar. `1` and `"1"` are distinct ids.
fn id_key(v: &Value) -> String {
    v.to_string()
}

fn project(row: &JoinRow, fields: &[FieldMap], out: &mut Map<String, Value>) {
    for f in fields {
        out.insert(f.key.to_string(), row.get(f.column).cloned().unwrap_or(Value::Null));
    }
}

fn new_slot(row: &JoinRow, id: &Value, spec: &AssemblySpec) -> Slot {
    let mut fields = Map::new();
    fields.insert(spec.id_key.to_string(), id.clone());
    project(row, spec.fields, &mut fields);
    let relations = spec
        .relations
        .iter()
        .map(|r| (r.name.to_string(), Vec::new()))
        .collect();
    Slot {
        resource: Resource {
            id: id.clone(),
            fields,
            relations,
        },
        seen: vec![HashSet::new(); spec.relations.len()],
    }
}

fn child_value(row: &JoinRow, child_id: &Value, rel: &RelationSpec) -> Value {
    match rel.shape {
        ChildShape::Identifier => child_id.clone(),
        ChildShape::Object => {
            let mut obj = Map::new();
            obj.insert(rel.id_key.to_string(), child_id.clone());
            project(row, rel.fields, &mut obj);
            Value::Object(obj)
        }
    }
}

/// Rebuild parents and their child collections from `rows`.
///
/// Parents come out in order of first appearance, so an upstream `ORDER BY` is
/// preserved. Each relation keeps first-occurrence order of its children and
/// drops repeats by child id, independently of the other relations. A row
/// without the parent id column (or with null there) means the query and the
/// spec disagree; that fails the whole call.
pub fn assemble(rows: &[JoinRow], spec: &AssemblySpec) -> Result<Vec<Resource>, AssembleError> {
    let mut parents: IndexMap<String, Slot> = IndexMap::new();

    for (index, row) in rows.iter().enumerate() {
        let id = match row.get(spec.parent_id) {
            Some(v) if !v.is_null() => v,
            _ => {
                return Err(AssembleError::MissingParentId {
                    column: spec.parent_id,
                    row: index,
                })
            }
        };
        let slot = parents
            .entry(id_key(id))
            .or_insert_with(|| new_slot(row, id, spec));

        for (i, rel) in spec.relations.iter().enumerate() {
            let Some(child_id) = row.get(rel.child_id).filter(|v| !v.is_null()) else {
                continue;
            };
            if !slot.seen[i].insert(id_key(child_id)) {
                continue;
            }
            let child = child_value(row, child_id, rel);
            if let Some(list) = slot.resource.relations.get_mut(rel.name) {
                list.push(child);
            }
        }
    }

    Ok(parents.into_values().map(|s| s.resource).collect())
}

/// Convenience for handlers: assemble and convert straight to JSON values.
pub fn assemble_json(rows: &[JoinRow], spec: &AssemblySpec) -> Result<Vec<Value>, AssembleError> {
    Ok(assemble(rows, spec)?.into_iter().map(Resource::into_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const IMAGE_FIELDS: &[FieldMap] = &[FieldMap::renamed("img_path", "path")];
    const SPEC_FIELDS: &[FieldMap] = &[FieldMap::renamed("spec_title", "title")];

    const IMAGES_ONLY: AssemblySpec = AssemblySpec {
        parent_id: "pid",
        id_key: "id",
        fields: &[FieldMap::same("name")],
        relations: &[RelationSpec {
            name: "images",
            child_id: "img_id",
            id_key: "id",
            fields: IMAGE_FIELDS,
            shape: ChildShape::Object,
        }],
    };

    const IMAGES_AND_SPECS: AssemblySpec = AssemblySpec {
        parent_id: "pid",
        id_key: "id",
        fields: &[FieldMap::same("name")],
        relations: &[
            RelationSpec {
                name: "images",
                child_id: "img_id",
                id_key: "id",
                fields: IMAGE_FIELDS,
                shape: ChildShape::Object,
            },
            RelationSpec {
                name: "specifications",
                child_id: "spec_id",
                id_key: "id",
                fields: SPEC_FIELDS,
                shape: ChildShape::Object,
            },
        ],
    };

    fn rows(v: Value) -> Vec<JoinRow> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn duplicate_child_row_is_collapsed() {
        let input = rows(json!([
            {"pid": 1, "name": "X", "img_id": 10, "img_path": "a.jpg"},
            {"pid": 1, "name": "X", "img_id": 11, "img_path": "b.jpg"},
            {"pid": 1, "name": "X", "img_id": 10, "img_path": "a.jpg"}
        ]));
        let out = assemble_json(&input, &IMAGES_ONLY).unwrap();
        assert_eq!(
            Value::Array(out),
            json!([{"id": 1, "name": "X", "images": [
                {"id": 10, "path": "a.jpg"},
                {"id": 11, "path": "b.jpg"}
            ]}])
        );
    }

    #[test]
    fn parents_keep_first_seen_order() {
        let input = rows(json!([
            {"pid": 2, "name": "B", "img_id": null, "img_path": null},
            {"pid": 1, "name": "A", "img_id": null, "img_path": null},
            {"pid": 2, "name": "B", "img_id": 5, "img_path": "c.jpg"}
        ]));
        let out = assemble(&input, &IMAGES_ONLY).unwrap();
        let ids: Vec<Value> = out.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(1)]);
        assert_eq!(out[0].children("images").len(), 1);
    }

    #[test]
    fn relations_deduplicate_independently() {
        let mut input = Vec::new();
        for img in [10, 11] {
            for spec in [1, 2, 3] {
                input.push(
                    json!({
                        "pid": 7, "name": "P",
                        "img_id": img, "img_path": format!("{img}.jpg"),
                        "spec_id": spec, "spec_title": format!("s{spec}")
                    })
                    .as_object()
                    .unwrap()
                    .clone(),
                );
            }
        }
        assert_eq!(input.len(), 6);
        let out = assemble(&input, &IMAGES_AND_SPECS).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].children("images").len(), 2);
        assert_eq!(out[0].children("specifications").len(), 3);
        assert_eq!(out[0].children("specifications")[2], json!({"id": 3, "title": "s3"}));
    }

    #[test]
    fn parent_without_children_has_empty_collections() {
        let input = rows(json!([{"pid": 3, "name": "lonely", "img_id": null, "spec_id": null}]));
        let out = assemble_json(&input, &IMAGES_AND_SPECS).unwrap();
        assert_eq!(
            out,
            vec![json!({"id": 3, "name": "lonely", "images": [], "specifications": []})]
        );
    }

    #[test]
    fn duplicating_every_row_changes_nothing() {
        let input = rows(json!([
            {"pid": 1, "name": "X", "img_id": 10, "img_path": "a.jpg", "spec_id": 4, "spec_title": "t"},
            {"pid": 2, "name": "Y", "img_id": 12, "img_path": "b.jpg", "spec_id": null, "spec_title": null},
            {"pid": 1, "name": "X", "img_id": 11, "img_path": "c.jpg", "spec_id": 4, "spec_title": "t"}
        ]));
        let doubled: Vec<JoinRow> = input.iter().chain(input.iter()).cloned().collect();
        assert_eq!(
            assemble(&input, &IMAGES_AND_SPECS).unwrap(),
            assemble(&doubled, &IMAGES_AND_SPECS).unwrap()
        );
    }

    #[test]
    fn identifier_shape_emits_bare_ids() {
        const IDS: AssemblySpec = AssemblySpec {
            parent_id: "pid",
            id_key: "id",
            fields: &[],
            relations: &[RelationSpec {
                name: "specifications",
                child_id: "spec_id",
                id_key: "id",
                fields: &[],
                shape: ChildShape::Identifier,
            }],
        };
        let input = rows(json!([
            {"pid": 1, "spec_id": 9},
            {"pid": 1, "spec_id": 8},
            {"pid": 1, "spec_id": 9}
        ]));
        let out = assemble_json(&input, &IDS).unwrap();
        assert_eq!(out, vec![json!({"id": 1, "specifications": [9, 8]})]);
    }

    #[test]
    fn same_id_different_payload_is_still_one_child() {
        let input = rows(json!([
            {"pid": 1, "name": "X", "img_id": 10, "img_path": "a.jpg"},
            {"pid": 1, "name": "X", "img_id": 10, "img_path": "a-renamed.jpg"}
        ]));
        let out = assemble(&input, &IMAGES_ONLY).unwrap();
        assert_eq!(out[0].children("images"), &[json!({"id": 10, "path": "a.jpg"})]);
    }

    #[test]
    fn missing_parent_id_fails_fast() {
        let input = rows(json!([
            {"pid": 1, "name": "X"},
            {"name": "orphan"}
        ]));
        let err = assemble(&input, &IMAGES_ONLY).unwrap_err();
        assert!(matches!(err, AssembleError::MissingParentId { column: "pid", row: 1 }));
    }

    #[test]
    fn null_parent_id_fails_fast() {
        let input = rows(json!([{"pid": null, "name": "X"}]));
        assert!(assemble(&input, &IMAGES_ONLY).is_err());
    }

    #[test]
    fn serialize_matches_into_json() {
        let input = rows(json!([{"pid": 1, "name": "X", "img_id": 10, "img_path": "a.jpg"}]));
        let resource = assemble(&input, &IMAGES_ONLY).unwrap().remove(0);
        let via_serde = serde_json::to_value(&resource).unwrap();
        assert_eq!(via_serde, resource.into_json());
    }
}
