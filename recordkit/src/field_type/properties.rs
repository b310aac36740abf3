use super::options::OptionsDescriptor;
use super::FieldType;
use crate::record::Record;
use crate::util;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

pub type Formatter = Arc<dyn Fn(Value, Option<&Record>, FormatContext) -> Value + Send + Sync>;
pub type Parser = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type Template = Arc<dyn Fn(Value, Option<&Record>) -> Value + Send + Sync>;
pub type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;
pub type EmptyPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type LabelFn = Arc<dyn Fn(Option<&Record>, String) -> String + Send + Sync>;
pub type CompareFn = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;
pub type AggregateFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;
pub type ExampleFn = Arc<dyn Fn(usize) -> Value + Send + Sync>;
pub type InputCharFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type MatchFn = Arc<dyn Fn(&str, &Value) -> bool + Send + Sync>;
pub type ValidateFn = Arc<dyn Fn(&ValidationContext<'_>) -> bool + Send + Sync>;
pub type AsyncValidateFn =
    Arc<dyn Fn(&ValidationContext<'_>) -> BoxFuture<'static, bool> + Send + Sync>;

/// Where a formatted value is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatContext {
    #[default]
    Default,
    Print,
    InputFocus,
    InputBlur,
}

impl FormatContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatContext::Default => "default",
            FormatContext::Print => "print",
            FormatContext::InputFocus => "input-focus",
            FormatContext::InputBlur => "input-blur",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Right,
    Center,
}

impl TextAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Right => "right",
            TextAlign::Center => "center",
        }
    }
}

/// Everything a validator can look at.
pub struct ValidationContext<'a> {
    pub field: &'a str,
    pub model_value: &'a Value,
    pub view_value: &'a Value,
    pub record: Option<&'a Record>,
    pub options: &'a Value,
    /// The field type running the validation.
    pub field_type: &'a FieldType,
}

#[derive(Clone)]
pub struct Validator {
    pub name: String,
    pub validate: ValidateFn,
}

impl Validator {
    pub fn new<F>(name: impl Into<String>, validate: F) -> Self
    where
        F: Fn(&ValidationContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            validate: Arc::new(validate),
        }
    }
}

#[derive(Clone)]
pub struct AsyncValidator {
    pub name: String,
    pub validate: AsyncValidateFn,
}

impl AsyncValidator {
    pub fn new<F>(name: impl Into<String>, validate: F) -> Self
    where
        F: Fn(&ValidationContext<'_>) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            validate: Arc::new(validate),
        }
    }
}

/// One failed validator for one value.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub name: String,
    pub field: String,
    pub model_value: Value,
    pub view_value: Value,
    pub record: Option<Record>,
    pub options: Value,
}

#[derive(Clone)]
pub struct ConditionalCellClass {
    pub class_name: String,
    pub when: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

/// A named sub-value of a composite field.
#[derive(Clone)]
pub struct Part {
    pub key: String,
    pub field_type: FieldType,
}

impl Part {
    pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            field_type,
        }
    }
}

/// Column aggregation applied by [`FieldType::aggregate`].
#[derive(Clone)]
pub enum Reducer {
    Sum,
    Custom(AggregateFn),
}

impl Reducer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Reducer::Custom(Arc::new(f))
    }

    pub(crate) fn into_fn(self) -> AggregateFn {
        match self {
            Reducer::Sum => Arc::new(sum_values),
            Reducer::Custom(f) => f,
        }
    }
}

fn sum_values(values: &[Value]) -> Value {
    if values.iter().all(|v| v.is_i64()) {
        Value::from(values.iter().filter_map(Value::as_i64).sum::<i64>())
    } else {
        Value::from(values.iter().filter_map(Value::as_f64).sum::<f64>())
    }
}

fn default_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

pub(crate) fn default_text_match(search: &str, value: &Value) -> bool {
    util::display_string(value)
        .to_lowercase()
        .contains(&search.to_lowercase())
}

/// Flat configuration behind a [`FieldType`]. Never mutated once wrapped.
#[derive(Clone)]
pub struct Properties {
    pub tag: String,
    pub input_type: String,
    pub schema: String,
    pub text_align: TextAlign,
    pub placeholder: String,
    pub descriptions: Vec<String>,

    pub formatters: Vec<Formatter>,
    pub parsers: Vec<Parser>,
    pub template: Template,
    pub validators: Vec<Validator>,
    pub async_validators: Vec<AsyncValidator>,

    pub disable_functions: Vec<RecordPredicate>,
    pub inline_functions: Vec<RecordPredicate>,
    pub readonly_functions: Vec<RecordPredicate>,
    pub segmented_functions: Vec<RecordPredicate>,
    pub required_functions: Vec<RecordPredicate>,
    pub visible_functions: Vec<RecordPredicate>,
    pub empty_functions: Vec<EmptyPredicate>,

    pub has_multiple_values: bool,
    pub min_value_count: usize,
    pub max_value_count: usize,
    pub default_value: Option<Value>,
    pub example_value: ExampleFn,

    pub options: Option<OptionsDescriptor>,

    pub min_column_width: u32,
    pub max_column_width: Option<u32>,
    pub target_column_width: Option<u32>,
    pub sortable: bool,
    pub aggregate: AggregateFn,

    pub compare_function: CompareFn,
    pub min_length: Option<usize>,
    pub max_length: usize,
    pub allow_input_char: InputCharFn,
    pub label_functions: Vec<LabelFn>,
    pub cell_classes: Vec<String>,
    pub conditional_cell_classes: Vec<ConditionalCellClass>,
    pub filter: MatchFn,
    pub parts: Vec<Part>,
}

impl Default for Properties {
    fn default() -> Self {
        let never: RecordPredicate = Arc::new(|_: &Record| false);
        let always: RecordPredicate = Arc::new(|_: &Record| true);
        let empty: EmptyPredicate = Arc::new(default_empty);
        Self {
            tag: "input".to_string(),
            input_type: "text".to_string(),
            schema: "simple".to_string(),
            text_align: TextAlign::Left,
            placeholder: String::new(),
            descriptions: Vec::new(),

            formatters: Vec::new(),
            parsers: Vec::new(),
            template: Arc::new(|value: Value, _: Option<&Record>| value),
            validators: Vec::new(),
            async_validators: Vec::new(),

            disable_functions: vec![never.clone()],
            inline_functions: vec![never.clone()],
            readonly_functions: vec![never.clone()],
            segmented_functions: vec![never.clone()],
            required_functions: vec![never],
            visible_functions: vec![always],
            empty_functions: vec![empty],

            has_multiple_values: false,
            min_value_count: 1,
            max_value_count: 1,
            default_value: None,
            example_value: Arc::new(|index: usize| Value::from(index)),

            options: None,

            min_column_width: 30,
            max_column_width: None,
            target_column_width: None,
            sortable: true,
            aggregate: Arc::new(|_: &[Value]| Value::String(String::new())),

            compare_function: Arc::new(util::compare_values),
            min_length: None,
            // HTML default for <input maxlength>
            max_length: 524_288,
            allow_input_char: Arc::new(|_: &str| true),
            label_functions: Vec::new(),
            cell_classes: Vec::new(),
            conditional_cell_classes: Vec::new(),
            filter: Arc::new(default_text_match),
            parts: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sum_keeps_integers_integral() {
        assert_eq!(sum_values(&[json!(1), json!(2), json!(3)]), json!(6));
        assert_eq!(sum_values(&[json!(1), json!(2.5)]), json!(3.5));
        assert_eq!(sum_values(&[]), json!(0));
    }

    #[test]
    fn test_default_empty_treats_whitespace_as_empty() {
        assert!(default_empty(&json!(null)));
        assert!(default_empty(&json!("  ")));
        assert!(!default_empty(&json!(0)));
        assert!(!default_empty(&json!(false)));
    }
}
