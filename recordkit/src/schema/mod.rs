pub mod types;

pub use types::*;

use crate::error::{RecordKitError, Result};
use crate::field_type::{primitives, FieldType, Reducer, INPUT_TYPES};
use crate::record::FieldTypeMap;
use regex::Regex;
use std::path::Path;

/// Parse and check a field-set YAML file.
pub fn parse_fieldset(path: &Path) -> Result<FieldsetDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_fieldset_str(&content)
}

/// Parse and check a field-set YAML string.
///
/// Field names are record keys read through dotted paths, so they must be
/// non-empty and contain no `.`.
pub fn parse_fieldset_str(content: &str) -> Result<FieldsetDefinition> {
    let fieldset: FieldsetDefinition = serde_yaml::from_str(content)?;
    if fieldset.fields.is_empty() {
        return Err(RecordKitError::Schema("Field set declares no fields".into()));
    }
    if let Some(name) = fieldset
        .fields
        .keys()
        .find(|name| name.trim().is_empty() || name.contains('.'))
    {
        return Err(RecordKitError::Schema(format!(
            "Field name '{name}' must be non-empty and contain no '.'"
        )));
    }
    Ok(fieldset)
}

impl FieldsetDefinition {
    /// Build a field type for every declared field, in declaration order.
    pub fn field_types(&self) -> Result<FieldTypeMap> {
        self.fields
            .iter()
            .map(|(name, definition)| Ok((name.clone(), definition.build(name)?)))
            .collect()
    }
}

impl FieldDefinition {
    /// Start from the primitive and apply each declared option through the builder.
    pub fn build(&self, name: &str) -> Result<FieldType> {
        let mut field_type = match self.primitive {
            Primitive::String => primitives::string(),
            Primitive::Number => primitives::number(),
            Primitive::Boolean => primitives::boolean(),
            Primitive::Date => primitives::date(),
        };

        if let Some(input_type) = &self.input_type {
            if !INPUT_TYPES.contains(&input_type.as_str()) {
                return Err(RecordKitError::Schema(format!(
                    "Field '{name}' has unknown input type '{input_type}'"
                )));
            }
            field_type = field_type.with().input_type(input_type);
        }
        if let Some(schema) = &self.schema {
            field_type = field_type.with().schema(schema);
        }
        if let Some(label) = &self.label {
            field_type = field_type.with().label(label);
        }
        if let Some(placeholder) = &self.placeholder {
            field_type = field_type.with().placeholder(placeholder);
        }
        if let Some(description) = &self.description {
            field_type = field_type.with().description(description);
        }
        if let Some(align) = self.text_align {
            field_type = field_type.with().text_align(align);
        }
        if self.required {
            field_type = field_type.that_is().required();
        }
        if let Some(length) = self.min_length {
            field_type = field_type.with().min_length(length);
        }
        if let Some(length) = self.max_length {
            field_type = field_type.with().max_length(length);
        }
        if let Some(mask) = &self.input_mask {
            let mask = Regex::new(mask).map_err(|e| {
                RecordKitError::Schema(format!("Field '{name}' has an invalid input mask: {e}"))
            })?;
            field_type = field_type.with().input_mask(mask);
        }
        if let Some(default) = &self.default {
            field_type = field_type.with().default_value(default.clone());
        }
        if let Some(example) = &self.example {
            field_type = field_type.with().example_value(example.clone());
        }
        if let Some(options) = &self.options {
            field_type = field_type.with().options(options.clone());
        }
        if let Some(multiple) = self.multiple {
            if multiple.min > multiple.max {
                return Err(RecordKitError::Schema(format!(
                    "Field '{name}' allows at least {} but at most {} values",
                    multiple.min, multiple.max
                )));
            }
            field_type = field_type.with().multiple_values(multiple.min, multiple.max);
        }
        if self.read_only {
            field_type = field_type.that_is().read_only();
        }
        if self.disabled {
            field_type = field_type.that_is().disabled();
        }
        if let Some(sortable) = self.sortable {
            field_type = field_type.that_is().sortable(sortable);
        }
        if let Some(ReducerName::Sum) = self.reducer {
            field_type = field_type.with().reducer(Reducer::Sum);
        }
        if let Some(class_name) = &self.cell_class {
            field_type = field_type.with().cell_class(class_name);
        }
        if let Some(width) = self.min_column_width {
            field_type = field_type.with().min_column_width(width);
        }
        if let Some(width) = self.max_column_width {
            field_type = field_type.with().max_column_width(width);
        }
        if let Some(width) = self.target_column_width {
            field_type = field_type.with().target_column_width(width);
        }

        Ok(field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::json;
    use std::io::Write;

    const FIELDSET: &str = r#"
fields:
  name:
    type: string
    required: true
    min_length: 2
    max_length: 40
    label: Name
  amount:
    type: number
    reducer: sum
  state:
    type: string
    options:
      - { text: NC, value: north }
      - { text: SC, value: south }
  tags:
    type: string
    multiple: { min: 1, max: 3 }
  paid:
    type: boolean
    read_only: true
  due:
    type: date
    sortable: false
"#;

    #[test]
    fn test_parse_fieldset_str() {
        let fieldset = parse_fieldset_str(FIELDSET).unwrap();
        let names: Vec<&String> = fieldset.fields.keys().collect();
        assert_eq!(names, vec!["name", "amount", "state", "tags", "paid", "due"]);

        let name = &fieldset.fields["name"];
        assert_eq!(name.primitive, Primitive::String);
        assert!(name.required);
        assert_eq!(name.min_length, Some(2));
        assert_eq!(fieldset.fields["amount"].reducer, Some(ReducerName::Sum));
        assert_eq!(
            fieldset.fields["tags"].multiple,
            Some(MultipleValues { min: 1, max: 3 })
        );
    }

    #[test]
    fn test_parse_fieldset_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIELDSET.as_bytes()).unwrap();
        let fieldset = parse_fieldset(file.path()).unwrap();
        assert_eq!(fieldset.fields.len(), 6);
    }

    #[test]
    fn test_builds_field_types() {
        let types = parse_fieldset_str(FIELDSET).unwrap().field_types().unwrap();
        let record = Record::new(
            types.clone(),
            json!({ "name": "J", "amount": 2, "paid": true, "due": "2024-01-01" }),
        )
        .unwrap();

        let name = &types["name"];
        assert_eq!(name.label(None), "Name");
        assert!(name.required(&record));
        assert_eq!(name.min_length(), Some(2));
        assert_eq!(record.readable_field_errors("name"), vec!["Name min-length"]);

        assert_eq!(types["amount"].aggregate(&[json!(1), json!(2)]), json!(3));
        assert_eq!(types["amount"].cell_classes(&json!(1)), vec!["numeric"]);
        assert!(types["state"].has_options());
        assert!(types["tags"].has_multiple_values());
        assert!(types["paid"].readonly(&record));
        assert!(!types["due"].sortable());
    }

    #[tokio::test]
    async fn test_options_from_yaml() {
        let types = parse_fieldset_str(FIELDSET).unwrap().field_types().unwrap();
        let options = types["state"].options(None).await.unwrap();
        assert_eq!(options[1]["text"], json!("SC"));
        assert_eq!(options[1]["value"], json!("south"));
    }

    #[test]
    fn test_rejects_unknown_input_type() {
        let fieldset = parse_fieldset_str("fields:\n  when: { input_type: sundial }\n").unwrap();
        let err = fieldset.field_types().unwrap_err();
        assert!(matches!(err, RecordKitError::Schema(msg) if msg.contains("sundial")));
    }

    #[test]
    fn test_rejects_bad_mask_and_counts() {
        let bad_mask = parse_fieldset_str("fields:\n  zip: { input_mask: '[0-9' }\n").unwrap();
        assert!(matches!(bad_mask.field_types(), Err(RecordKitError::Schema(_))));

        let bad_counts =
            parse_fieldset_str("fields:\n  tags: { multiple: { min: 4, max: 2 } }\n").unwrap();
        assert!(matches!(bad_counts.field_types(), Err(RecordKitError::Schema(_))));
    }

    #[test]
    fn test_rejects_empty_and_dotted_field_names() {
        let empty = parse_fieldset_str("fields: {}\n").unwrap_err();
        assert!(matches!(empty, RecordKitError::Schema(msg) if msg.contains("no fields")));

        let dotted = parse_fieldset_str("fields:\n  address.city: { type: string }\n").unwrap_err();
        assert!(matches!(dotted, RecordKitError::Schema(msg) if msg.contains("address.city")));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_fieldset(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, RecordKitError::Io(_)));
    }

    #[test]
    fn test_unknown_primitive_is_a_yaml_error() {
        let err = parse_fieldset_str("fields:\n  x: { type: blob }\n").unwrap_err();
        assert!(matches!(err, RecordKitError::Yaml(_)));
    }
}
