use crate::field_type::TextAlign;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level field-set definition parsed from a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldsetDefinition {
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
}

/// Definition of a single field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type", default)]
    pub primitive: Primitive,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub example: Option<Value>,
    /// HTML input type; must be one of `field_type::INPUT_TYPES`
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub text_align: Option<TextAlign>,
    #[serde(default)]
    pub options: Option<Vec<Value>>,
    #[serde(default)]
    pub multiple: Option<MultipleValues>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub sortable: Option<bool>,
    #[serde(default)]
    pub reducer: Option<ReducerName>,
    #[serde(default)]
    pub cell_class: Option<String>,
    /// Regex each typed character must match
    #[serde(default)]
    pub input_mask: Option<String>,
    #[serde(default)]
    pub min_column_width: Option<u32>,
    #[serde(default)]
    pub max_column_width: Option<u32>,
    #[serde(default)]
    pub target_column_width: Option<u32>,
}

/// Stock field type a definition starts from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    #[default]
    String,
    Number,
    Boolean,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleValues {
    #[serde(default)]
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReducerName {
    Sum,
}
