use super::options::{OptionsConfig, OptionsDescriptor};
use super::properties::{
    default_text_match, AsyncValidator, ConditionalCellClass, FormatContext, MatchFn, Part,
    Properties, RecordPredicate, Reducer, TextAlign, ValidationContext, Validator,
};
use super::FieldType;
use crate::record::Record;
use crate::util::{self, describe_fn};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// Fluent, copy-on-write configuration over a [`FieldType`].
///
/// Every method clones the receiver's properties, changes the requested
/// entries, records a description and returns a brand new `FieldType`.
/// The receiver is never touched.
pub struct FieldTypeBuilder<'a> {
    base: &'a FieldType,
}

impl<'a> FieldTypeBuilder<'a> {
    pub(crate) fn new(base: &'a FieldType) -> Self {
        Self { base }
    }

    fn derive(&self, description: Option<String>, change: impl FnOnce(&mut Properties)) -> FieldType {
        let mut properties = self.base.properties().clone();
        change(&mut properties);
        if let Some(description) = description {
            properties.descriptions.push(description);
        }
        FieldType::from_properties(properties)
    }

    // Pipelines

    pub fn validator(&self, validator: Validator) -> FieldType {
        let description = format!("validator: {}", validator.name);
        self.derive(Some(description), |p| p.validators.push(validator))
    }

    pub fn async_validator(&self, validator: AsyncValidator) -> FieldType {
        let description = format!("async validator: {}", validator.name);
        self.derive(Some(description), |p| p.async_validators.push(validator))
    }

    pub fn formatter<F>(&self, f: F) -> FieldType
    where
        F: Fn(Value, Option<&Record>, FormatContext) -> Value + Send + Sync + 'static,
    {
        let description = format!("formatter: {}", describe_fn(&f));
        self.derive(Some(description), |p| p.formatters.push(Arc::new(f)))
    }

    /// Parsers are prepended: the most recently added one runs first.
    pub fn parser<F>(&self, f: F) -> FieldType
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let description = format!("parser: {}", describe_fn(&f));
        self.derive(Some(description), |p| p.parsers.insert(0, Arc::new(f)))
    }

    pub fn template<F>(&self, f: F) -> FieldType
    where
        F: Fn(Value, Option<&Record>) -> Value + Send + Sync + 'static,
    {
        let description = format!("template: {}", describe_fn(&f));
        self.derive(Some(description), |p| p.template = Arc::new(f))
    }

    // Identity and rendering

    pub fn tag(&self, tag: &str) -> FieldType {
        self.derive(Some(format!("tag: {tag}")), |p| p.tag = tag.to_string())
    }

    pub fn input_type(&self, input_type: &str) -> FieldType {
        self.derive(Some(format!("type: {input_type}")), |p| {
            p.input_type = input_type.to_string()
        })
    }

    pub fn schema(&self, schema: &str) -> FieldType {
        self.derive(Some(format!("schema: {schema}")), |p| p.schema = schema.to_string())
    }

    pub fn text_align(&self, align: TextAlign) -> FieldType {
        self.derive(Some(format!("text align: {}", align.as_str())), |p| p.text_align = align)
    }

    pub fn placeholder(&self, text: &str) -> FieldType {
        self.derive(Some(format!("placeholder: \"{text}\"")), |p| {
            p.placeholder = text.to_string()
        })
    }

    pub fn label(&self, text: &str) -> FieldType {
        let label = text.to_string();
        self.derive(Some(format!("label: \"{text}\"")), |p| {
            p.label_functions.push(Arc::new(move |_: Option<&Record>, _: String| label.clone()))
        })
    }

    /// Label computed from the record and the label built so far.
    pub fn label_with<F>(&self, f: F) -> FieldType
    where
        F: Fn(Option<&Record>, String) -> String + Send + Sync + 'static,
    {
        let description = format!("label (function): {}", describe_fn(&f));
        self.derive(Some(description), |p| p.label_functions.push(Arc::new(f)))
    }

    pub fn description(&self, text: &str) -> FieldType {
        self.derive(Some(text.to_string()), |_| {})
    }

    pub fn cell_class(&self, class_name: &str) -> FieldType {
        self.derive(Some(format!("cell class: {class_name}")), |p| {
            p.cell_classes.push(class_name.to_string())
        })
    }

    pub fn conditional_cell_class<F>(&self, when: F, class_name: &str) -> FieldType
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let description = format!("cell class: {class_name} when {}", describe_fn(&when));
        self.derive(Some(description), |p| {
            p.conditional_cell_classes.push(ConditionalCellClass {
                class_name: class_name.to_string(),
                when: Arc::new(when),
            })
        })
    }

    // Values

    pub fn default_value(&self, value: Value) -> FieldType {
        let description = format!("default value: {}", util::display_string(&value));
        self.derive(Some(description), |p| p.default_value = Some(value))
    }

    /// The same example value for every row.
    pub fn example_value(&self, value: Value) -> FieldType {
        let description = format!("example value: {}", util::display_string(&value));
        self.derive(Some(description), |p| {
            p.example_value = Arc::new(move |_: usize| value.clone())
        })
    }

    pub fn example_value_with<F>(&self, f: F) -> FieldType
    where
        F: Fn(usize) -> Value + Send + Sync + 'static,
    {
        let description = format!("example value (function): {}", describe_fn(&f));
        self.derive(Some(description), |p| p.example_value = Arc::new(f))
    }

    pub fn multiple_values(&self, min: usize, max: usize) -> FieldType {
        self.derive(Some(format!("multiple values ({min} to {max})")), |p| {
            p.has_multiple_values = true;
            p.min_value_count = min;
            p.max_value_count = max;
        })
    }

    pub fn options(&self, config: impl Into<OptionsConfig>) -> FieldType {
        let config = config.into();
        let description = format!("options ({})", config.summary());
        self.derive(Some(description), |p| {
            p.options = Some(OptionsDescriptor::new(config))
        })
    }

    pub fn parts(&self, parts: Vec<Part>) -> FieldType {
        let keys: Vec<&str> = parts.iter().map(|part| part.key.as_str()).collect();
        let description = format!("parts: {}", keys.join(", "));
        self.derive(Some(description), |p| p.parts = parts)
    }

    // Columns

    pub fn min_column_width(&self, width: u32) -> FieldType {
        self.derive(Some(format!("min column width: {width}")), |p| {
            p.min_column_width = width
        })
    }

    pub fn max_column_width(&self, width: u32) -> FieldType {
        self.derive(Some(format!("max column width: {width}")), |p| {
            p.max_column_width = Some(width)
        })
    }

    pub fn target_column_width(&self, width: u32) -> FieldType {
        self.derive(Some(format!("target column width: {width}")), |p| {
            p.target_column_width = Some(width)
        })
    }

    pub fn sortable(&self, sortable: bool) -> FieldType {
        self.derive(Some(format!("sortable: {sortable}")), |p| p.sortable = sortable)
    }

    pub fn compare_function<F>(&self, f: F) -> FieldType
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        let description = format!("compare function: {}", describe_fn(&f));
        self.derive(Some(description), |p| p.compare_function = Arc::new(f))
    }

    pub fn reducer(&self, reducer: Reducer) -> FieldType {
        let description = match &reducer {
            Reducer::Sum => "reducer: sum".to_string(),
            Reducer::Custom(_) => "reducer: custom".to_string(),
        };
        self.derive(Some(description), |p| p.aggregate = reducer.into_fn())
    }

    /// Text-search predicate; `None` restores the case-insensitive contains match.
    pub fn filter<F>(&self, f: Option<F>) -> FieldType
    where
        F: Fn(&str, &Value) -> bool + Send + Sync + 'static,
    {
        self.derive(None, |p| {
            p.filter = match f {
                Some(f) => Arc::new(f) as MatchFn,
                None => Arc::new(default_text_match),
            }
        })
    }

    // Record predicates

    pub fn disabled(&self) -> FieldType {
        self.derive(Some("disabled".into()), |p| p.disable_functions.push(always()))
    }

    pub fn disabled_when<F>(&self, f: F) -> FieldType
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        let description = format!("disabled when {}", describe_fn(&f));
        self.derive(Some(description), |p| p.disable_functions.push(Arc::new(f)))
    }

    pub fn visible_when<F>(&self, f: F) -> FieldType
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        let description = format!("visible when {}", describe_fn(&f));
        self.derive(Some(description), |p| p.visible_functions.push(Arc::new(f)))
    }

    pub fn empty_when<F>(&self, f: F) -> FieldType
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let description = format!("empty when {}", describe_fn(&f));
        self.derive(Some(description), |p| p.empty_functions.push(Arc::new(f)))
    }

    pub fn read_only(&self) -> FieldType {
        self.derive(Some("read only".into()), |p| p.readonly_functions.push(always()))
    }

    pub fn read_only_when<F>(&self, f: F) -> FieldType
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        let description = format!("read only when {}", describe_fn(&f));
        self.derive(Some(description), |p| p.readonly_functions.push(Arc::new(f)))
    }

    pub fn inline(&self) -> FieldType {
        self.derive(Some("inline".into()), |p| p.inline_functions.push(always()))
    }

    pub fn inline_when<F>(&self, f: F) -> FieldType
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        let description = format!("inline when {}", describe_fn(&f));
        self.derive(Some(description), |p| p.inline_functions.push(Arc::new(f)))
    }

    pub fn segmented(&self) -> FieldType {
        self.derive(Some("segmented".into()), |p| p.segmented_functions.push(always()))
    }

    // Validation shortcuts

    /// Marks the field required and installs a `required` validator that
    /// fails when the value is empty by this field type's empty predicates.
    pub fn required(&self) -> FieldType {
        self.derive(Some("required".into()), |p| {
            p.required_functions.push(always());
            p.validators.push(Validator::new("required", |ctx| {
                !ctx.field_type.is_empty_value(ctx.model_value)
            }));
        })
    }

    /// Required only while `f` holds for the record. The condition is
    /// evaluated once per validation; without a record the value is valid.
    pub fn required_when<F>(&self, f: F) -> FieldType
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        let description = format!("required when {}", describe_fn(&f));
        let condition: RecordPredicate = Arc::new(f);
        let check = Arc::clone(&condition);
        self.derive(Some(description), move |p| {
            p.required_functions.push(condition);
            p.validators.push(Validator::new("required-when", move |ctx: &ValidationContext<'_>| {
                match ctx.record {
                    Some(record) if check(record) => !ctx.field_type.is_empty_value(ctx.model_value),
                    _ => true,
                }
            }));
        })
    }

    pub fn min_length(&self, length: usize) -> FieldType {
        self.derive(Some(format!("minlength = {length}")), |p| {
            p.min_length = Some(length);
            p.validators.push(Validator::new("min-length", move |ctx| {
                !util::is_truthy(ctx.model_value) || util::value_length(ctx.model_value) >= length
            }));
        })
    }

    pub fn max_length(&self, length: usize) -> FieldType {
        self.derive(Some(format!("maxlength = {length}")), |p| {
            p.max_length = length;
            p.validators.push(Validator::new("max-length", move |ctx| {
                !util::is_truthy(ctx.model_value) || util::value_length(ctx.model_value) <= length
            }));
        })
    }

    /// Single typed characters must match `mask`; longer input (paste) is allowed.
    pub fn input_mask(&self, mask: Regex) -> FieldType {
        let description = format!("input mask: /{}/", mask.as_str());
        self.derive(Some(description), |p| {
            p.allow_input_char =
                Arc::new(move |input: &str| input.chars().count() != 1 || mask.is_match(input))
        })
    }

    /// An independent instance over the same properties.
    pub fn copy(&self) -> FieldType {
        self.base.copy()
    }
}

fn always() -> RecordPredicate {
    Arc::new(|_: &Record| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    fn shout(value: Value, _: Option<&Record>, _: FormatContext) -> Value {
        json!(util::display_string(&value).to_uppercase())
    }

    #[test]
    fn test_descriptions_accumulate_per_derivation() {
        let base = FieldType::new().with().required();
        let a = base.with().min_length(2);
        let b = base.with().default_value(json!("x"));

        assert_eq!(base.info(), &["required"]);
        assert_eq!(a.info(), &["required", "minlength = 2"]);
        assert_eq!(b.info(), &["required", "default value: x"]);
    }

    #[test]
    fn test_named_functions_are_described_by_name() {
        let field_type = FieldType::new().with().formatter(shout);
        assert_eq!(field_type.info(), &["formatter: shout"]);
        assert_eq!(
            field_type.format(&json!("hey"), None, FormatContext::Default),
            json!("HEY")
        );
    }

    #[test]
    fn test_filter_none_restores_text_match() {
        let exact = FieldType::new()
            .with()
            .filter(Some(|search: &str, value: &Value| value == &json!(search)));
        assert!(exact.matches("abc", &json!("abc")));
        assert!(!exact.matches("ab", &json!("abc")));

        let loose = exact.with().filter(None::<fn(&str, &Value) -> bool>);
        assert!(loose.matches("AB", &json!("abc")));
    }

    #[test]
    fn test_multiple_values_sets_counts() {
        let field_type = FieldType::new().with().multiple_values(2, 4);
        assert!(field_type.has_multiple_values());
        assert_eq!(field_type.min_value_count(), 2);
        assert_eq!(field_type.max_value_count(), 4);
        assert_eq!(field_type.info(), &["multiple values (2 to 4)"]);
    }

    #[test]
    fn test_display_settings_are_described() {
        let field_type = FieldType::new()
            .with()
            .text_align(TextAlign::Right)
            .and()
            .cell_class("numeric")
            .and()
            .conditional_cell_class(|v: &Value| v.is_null(), "blank")
            .and()
            .example_value(json!("Bobby"))
            .and()
            .reducer(Reducer::Sum)
            .and()
            .async_validator(AsyncValidator::new("unique", |_: &ValidationContext<'_>| {
                async { true }.boxed()
            }));
        assert_eq!(
            field_type.info(),
            &[
                "text align: right",
                "cell class: numeric",
                "cell class: blank when <closure>",
                "example value: Bobby",
                "reducer: sum",
                "async validator: unique",
            ]
        );
    }

    #[test]
    fn test_options_description_lists_configured_keys() {
        let field_type = FieldType::new()
            .with()
            .options(OptionsConfig::data(vec![]).text("name").fields(["state"]));
        assert_eq!(field_type.info(), &["options (data, text, fields)"]);
        assert!(field_type.has_options());
    }

    #[test]
    fn test_derived_types_share_options_cache() {
        let base = FieldType::new().with().options(vec![json!({ "text": "A", "value": 1 })]);
        let derived = base.with().label("Letter");
        let (Some(a), Some(b)) = (&base.properties().options, &derived.properties().options) else {
            panic!("options missing");
        };
        assert!(!a.is_cached());
        drop(derived.options(None));
        assert!(a.is_cached());
        assert!(b.is_cached());
    }
}
