use super::{Fetch, Recordset};
use crate::record::FieldTypeMap;
use serde_json::{Map, Value};
use std::sync::Arc;

impl Recordset {
    /// A client-side recordset of `row_count` rows filled from each field
    /// type's example values.
    pub fn example(field_types: impl Into<Arc<FieldTypeMap>>, row_count: usize) -> Recordset {
        let field_types = field_types.into();
        let rows: Vec<Value> = (0..row_count)
            .map(|index| {
                let row: Map<String, Value> = field_types
                    .iter()
                    .map(|(name, field_type)| (name.clone(), field_type.example_value(index)))
                    .collect();
                Value::Object(row)
            })
            .collect();
        Recordset::new(field_types, Fetch::data(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::FieldType;
    use crate::record::field_type_map;
    use serde_json::json;

    #[tokio::test]
    async fn test_example_rows() {
        let rs = Recordset::example(
            field_type_map([
                ("name", FieldType::new().with().example_value(json!("Bobby"))),
                (
                    "seat",
                    FieldType::new().with().example_value_with(|index: usize| json!(index * 2)),
                ),
            ]),
            5,
        );
        rs.request_update().await;

        assert_eq!(rs.all_records().len(), 5);
        assert!(rs.is_client_side());
        let first = rs.get_record_at_index(0).unwrap();
        assert_eq!(first.get_field("name"), json!("Bobby"));
        assert_eq!(rs.get_record_at_index(3).unwrap().get_field("seat"), json!(6));
    }
}
