//! Property tests for field→type parent links

use proptest::prelude::*;
use schemagen::schema::{link_parents, RawSchema, Schema};
use serde_json::json;

/// Raw schema with `type_fields[i]` fields on type `T{i}`, all of scalar type.
fn raw_schema(type_fields: &[usize]) -> RawSchema {
    let mut types: Vec<serde_json::Value> = type_fields
        .iter()
        .enumerate()
        .map(|(i, count)| {
            let fields: Vec<_> = (0..*count)
                .map(|f| json!({"name": format!("f{}", f), "type": {"kind": "SCALAR", "name": "String"}}))
                .collect();
            json!({"kind": "OBJECT", "name": format!("T{}", i), "fields": fields})
        })
        .collect();
    types.push(json!({"kind": "SCALAR", "name": "String"}));
    serde_json::from_value(json!({ "types": types })).unwrap()
}

proptest! {
    #[test]
    fn prop_link_parents_points_at_owner(type_fields in prop::collection::vec(0usize..6, 0..8)) {
        let mut schema = Schema::from_raw(raw_schema(&type_fields));
        link_parents(&mut schema);

        for (type_id, _) in schema.types() {
            for (_, field) in schema.fields_of(type_id) {
                prop_assert_eq!(field.parent(), Some(type_id));
            }
        }
        prop_assert_eq!(schema.field_count(), type_fields.iter().sum::<usize>());
        prop_assert!(schema.validate_references().is_ok());
    }

    #[test]
    fn prop_link_parents_is_idempotent(type_fields in prop::collection::vec(0usize..6, 0..8)) {
        let mut once = Schema::from_raw(raw_schema(&type_fields));
        link_parents(&mut once);
        let mut twice = once.clone();
        link_parents(&mut twice);
        prop_assert_eq!(once, twice);
    }
}
