pub mod builder;
pub mod options;
pub mod primitives;
pub mod properties;

pub use builder::FieldTypeBuilder;
pub use options::{OptionKey, OptionsConfig, OptionsDescriptor, OptionsFuture, OptionsResult};
pub use properties::{
    AsyncValidator, FormatContext, Part, Properties, Reducer, TextAlign, ValidationContext,
    ValidationError, Validator,
};

use crate::error::{RecordKitError, Result};
use crate::record::Record;
use futures::future::{self, FutureExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Input types a field may declare.
pub const INPUT_TYPES: &[&str] = &[
    "button",
    "checkbox",
    "color",
    "date",
    "datetime-local",
    "email",
    "file",
    "hidden",
    "image",
    "month",
    "number",
    "password",
    "radio",
    "range",
    "search",
    "submit",
    "tel",
    "text",
    "time",
    "url",
    "week",
];

/// Immutable description of how one kind of value is parsed, formatted,
/// validated and presented. Derive variations through [`FieldType::with`].
///
/// Cloning shares the instance (including the display-text cache that option
/// lookups populate); [`FieldType::copy`] makes an independent instance with
/// the same properties.
#[derive(Clone)]
pub struct FieldType {
    properties: Arc<Properties>,
    results_text: Arc<Mutex<HashMap<String, Value>>>,
}

impl Default for FieldType {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("tag", &self.properties.tag)
            .field("input_type", &self.properties.input_type)
            .field("schema", &self.properties.schema)
            .field("descriptions", &self.properties.descriptions)
            .finish()
    }
}

impl FieldType {
    pub fn new() -> Self {
        Self::from_properties(Properties::default())
    }

    pub fn from_properties(properties: Properties) -> Self {
        Self {
            properties: Arc::new(properties),
            results_text: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// A fresh instance over the same properties.
    pub fn copy(&self) -> Self {
        Self {
            properties: Arc::clone(&self.properties),
            results_text: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // ── Builder entry points ─────────────────────────────────────────

    pub fn with(&self) -> FieldTypeBuilder<'_> {
        FieldTypeBuilder::new(self)
    }

    pub fn and(&self) -> FieldTypeBuilder<'_> {
        self.with()
    }

    pub fn that_is(&self) -> FieldTypeBuilder<'_> {
        self.with()
    }

    pub fn that_has(&self) -> FieldTypeBuilder<'_> {
        self.with()
    }

    pub fn and_is(&self) -> FieldTypeBuilder<'_> {
        self.with()
    }

    pub fn that_will(&self) -> FieldTypeBuilder<'_> {
        self.with()
    }

    pub fn that_uses(&self) -> FieldTypeBuilder<'_> {
        self.with()
    }

    pub fn that(&self) -> FieldTypeBuilder<'_> {
        self.with()
    }

    // ── Value pipeline ───────────────────────────────────────────────

    /// Display value: cached option text for this raw value if any, then
    /// every formatter in registration order.
    pub fn format(&self, value: &Value, record: Option<&Record>, context: FormatContext) -> Value {
        let cached = self.results_text.lock().get(&value.to_string()).cloned();
        let mut output = cached.unwrap_or_else(|| value.clone());
        for formatter in &self.properties.formatters {
            output = formatter(output, record, context);
        }
        output
    }

    pub fn print(&self, value: &Value, record: Option<&Record>) -> Value {
        (self.properties.template)(self.format(value, record, FormatContext::Print), record)
    }

    /// Model value from input. Parsers run most-recently-registered first.
    pub fn parse(&self, value: Value) -> Value {
        self.properties
            .parsers
            .iter()
            .fold(value, |output, parser| parser(output))
    }

    pub fn validate(
        &self,
        field: &str,
        model_value: &Value,
        view_value: &Value,
        record: Option<&Record>,
        options: &Value,
    ) -> Vec<ValidationError> {
        let ctx = ValidationContext {
            field,
            model_value,
            view_value,
            record,
            options,
            field_type: self,
        };

        self.properties
            .validators
            .iter()
            .filter(|validator| !(validator.validate)(&ctx))
            .map(|validator| validation_error(&validator.name, &ctx))
            .collect()
    }

    pub async fn validate_async(
        &self,
        field: &str,
        model_value: &Value,
        view_value: &Value,
        record: Option<&Record>,
        options: &Value,
    ) -> Vec<ValidationError> {
        let ctx = ValidationContext {
            field,
            model_value,
            view_value,
            record,
            options,
            field_type: self,
        };

        let pending: Vec<_> = self
            .properties
            .async_validators
            .iter()
            .map(|validator| (validator.validate)(&ctx))
            .collect();
        let outcomes = future::join_all(pending).await;

        self.properties
            .async_validators
            .iter()
            .zip(outcomes)
            .filter(|(_, valid)| !valid)
            .map(|(validator, _)| validation_error(&validator.name, &ctx))
            .collect()
    }

    /// Default for a new value. Multi-value fields default to `"all"`, range
    /// schemas to `["range", 0, 0]`, then the passed value, then the
    /// configured default, then `""`.
    pub fn default_value(&self, value: Option<Value>) -> Value {
        let configured = self.properties.default_value.as_ref();
        let truthy = configured.filter(|v| crate::util::is_truthy(v)).cloned();

        if self.properties.has_multiple_values {
            return truthy.unwrap_or_else(|| Value::String("all".to_string()));
        }
        if self.properties.schema == "range" {
            return truthy.unwrap_or_else(|| serde_json::json!(["range", 0, 0]));
        }
        if let Some(value) = value.filter(|v| !v.is_null()) {
            return value;
        }
        match configured {
            Some(v) if !v.is_null() => v.clone(),
            _ => Value::String(String::new()),
        }
    }

    pub fn example_value(&self, index: usize) -> Value {
        (self.properties.example_value)(index)
    }

    // ── Options ──────────────────────────────────────────────────────

    pub fn has_options(&self) -> bool {
        self.properties.options.is_some()
    }

    /// Choice list for `record`, from cache when the relevant record fields
    /// hash the same as last time (or the source ignores the record).
    pub fn options(&self, record: Option<&Record>) -> OptionsFuture {
        let Some(descriptor) = &self.properties.options else {
            return future::ready(Ok(Arc::new(Vec::new()))).boxed().shared();
        };

        let results_text = Arc::clone(&self.results_text);
        let on_loaded = Box::new(move |items: &[Value]| {
            let mut cache = results_text.lock();
            for item in items {
                let value = item.get("value").unwrap_or(&Value::Null);
                if !value.is_object() {
                    let text = item.get("text").cloned().unwrap_or(Value::Null);
                    cache.insert(value.to_string(), text);
                }
            }
        });

        descriptor.load(record, self.properties.schema == "datepicker", on_loaded)
    }

    // ── Record predicates ────────────────────────────────────────────

    pub fn is_disabled(&self, record: &Record) -> bool {
        self.properties.disable_functions.iter().any(|f| f(record))
    }

    pub fn required(&self, record: &Record) -> bool {
        self.properties.required_functions.iter().any(|f| f(record))
    }

    /// Visible only when every visibility gate passes.
    pub fn visible(&self, record: &Record) -> bool {
        self.properties.visible_functions.iter().all(|f| f(record))
    }

    pub fn readonly(&self, record: &Record) -> bool {
        self.properties.readonly_functions.iter().any(|f| f(record))
    }

    pub fn inline(&self, record: &Record) -> bool {
        self.properties.inline_functions.iter().any(|f| f(record))
    }

    pub fn segmented(&self, record: &Record) -> bool {
        self.properties.segmented_functions.iter().any(|f| f(record))
    }

    pub fn empty(&self, record: Option<&Record>, field: &str) -> bool {
        let value = record.map(|r| r.get_field(field)).unwrap_or(Value::Null);
        self.is_empty_value(&value)
    }

    pub fn is_empty_value(&self, value: &Value) -> bool {
        self.properties.empty_functions.iter().any(|f| f(value))
    }

    // ── Presentation ─────────────────────────────────────────────────

    pub fn tag(&self) -> &str {
        &self.properties.tag
    }

    pub fn schema(&self) -> &str {
        &self.properties.schema
    }

    /// The configured input type, or an error when it is not a known HTML input type.
    pub fn input_type(&self) -> Result<&str> {
        let input_type = self.properties.input_type.as_str();
        if INPUT_TYPES.contains(&input_type) {
            Ok(input_type)
        } else {
            Err(RecordKitError::InvalidInputType(input_type.to_string()))
        }
    }

    pub fn text_align(&self) -> TextAlign {
        self.properties.text_align
    }

    pub fn placeholder(&self) -> &str {
        &self.properties.placeholder
    }

    pub fn label(&self, record: Option<&Record>) -> String {
        self.properties
            .label_functions
            .iter()
            .fold(String::new(), |label, f| f(record, label))
    }

    pub fn cell_classes(&self, value: &Value) -> Vec<String> {
        let mut classes = self.properties.cell_classes.clone();
        classes.extend(
            self.properties
                .conditional_cell_classes
                .iter()
                .filter(|c| (c.when)(value))
                .map(|c| c.class_name.clone()),
        );
        classes
    }

    pub fn info(&self) -> &[String] {
        &self.properties.descriptions
    }

    // ── Column behaviour ─────────────────────────────────────────────

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        (self.properties.compare_function)(a, b)
    }

    pub fn aggregate(&self, values: &[Value]) -> Value {
        (self.properties.aggregate)(values)
    }

    pub fn matches(&self, search: &str, value: &Value) -> bool {
        (self.properties.filter)(search, value)
    }

    pub fn sortable(&self) -> bool {
        self.properties.sortable
    }

    pub fn min_column_width(&self) -> u32 {
        self.properties.min_column_width
    }

    pub fn max_column_width(&self) -> Option<u32> {
        self.properties.max_column_width
    }

    pub fn target_column_width(&self) -> Option<u32> {
        self.properties.target_column_width
    }

    // ── Value shape ──────────────────────────────────────────────────

    pub fn has_multiple_values(&self) -> bool {
        self.properties.has_multiple_values
    }

    pub fn min_value_count(&self) -> usize {
        self.properties.min_value_count
    }

    pub fn max_value_count(&self) -> usize {
        self.properties.max_value_count
    }

    pub fn min_length(&self) -> Option<usize> {
        self.properties.min_length
    }

    pub fn max_length(&self) -> usize {
        self.properties.max_length
    }

    pub fn allow_input_char(&self, input: &str) -> bool {
        (self.properties.allow_input_char)(input)
    }

    pub fn has_parts(&self) -> bool {
        !self.properties.parts.is_empty()
    }

    pub fn parts(&self) -> &[Part] {
        &self.properties.parts
    }

    pub fn part(&self, key: &str) -> Option<&FieldType> {
        self.properties
            .parts
            .iter()
            .find(|part| part.key == key)
            .map(|part| &part.field_type)
    }
}

fn validation_error(name: &str, ctx: &ValidationContext<'_>) -> ValidationError {
    ValidationError {
        name: name.to_string(),
        field: ctx.field.to_string(),
        model_value: ctx.model_value.clone(),
        view_value: ctx.view_value.clone(),
        record: ctx.record.cloned(),
        options: ctx.options.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldTypeMap, Record};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn errors_for(field_type: &FieldType, value: Value) -> Vec<String> {
        field_type
            .validate("test", &value, &Value::Null, None, &Value::Null)
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[test]
    fn test_builder_leaves_base_untouched() {
        let base = FieldType::new();
        let a = base.with().formatter(|v: Value, _, _| json!(format!("a:{}", v)));
        let b = base.with().validator(Validator::new("never", |_| false));

        assert!(base.properties().formatters.is_empty());
        assert!(base.properties().validators.is_empty());
        assert_eq!(a.properties().formatters.len(), 1);
        assert!(a.properties().validators.is_empty());
        assert!(b.properties().formatters.is_empty());
        assert_eq!(b.properties().validators.len(), 1);
        assert!(base.info().is_empty());
    }

    #[test]
    fn test_formatters_in_order_parsers_in_reverse() {
        let field_type = FieldType::new()
            .with()
            .formatter(|v: Value, _, _| json!(format!("{}1", v.as_str().unwrap_or(""))))
            .and()
            .formatter(|v: Value, _, _| json!(format!("{}2", v.as_str().unwrap_or(""))))
            .and()
            .parser(|v: Value| json!(format!("{}p1", v.as_str().unwrap_or(""))))
            .and()
            .parser(|v: Value| json!(format!("{}p2", v.as_str().unwrap_or(""))));

        assert_eq!(field_type.format(&json!("x"), None, FormatContext::Default), json!("x12"));
        assert_eq!(field_type.parse(json!("x")), json!("xp2p1"));
    }

    #[test]
    fn test_print_applies_template_after_formatters() {
        let field_type = FieldType::new()
            .with()
            .formatter(|v: Value, _, ctx| json!(format!("{}:{}", v.as_str().unwrap_or(""), ctx.as_str())))
            .and()
            .template(|v: Value, _| json!(format!("[{}]", v.as_str().unwrap_or(""))));

        assert_eq!(field_type.print(&json!("a"), None), json!("[a:print]"));
    }

    #[test]
    fn test_required_installs_validator() {
        let required = FieldType::new().with().required();
        assert_eq!(errors_for(&required, json!("")), vec!["required"]);
        assert_eq!(errors_for(&required, json!("   ")), vec!["required"]);
        assert!(errors_for(&required, json!("x")).is_empty());
        assert!(errors_for(&FieldType::new(), json!("")).is_empty());
    }

    #[test]
    fn test_required_when_skips_when_condition_false() {
        let field_type = FieldType::new()
            .with()
            .required_when(|record: &Record| record.get_field("mode") == json!("strict"));
        let lax = Record::new(FieldTypeMap::new(), json!({ "mode": "lax", "name": "" })).unwrap();
        let strict = Record::new(FieldTypeMap::new(), json!({ "mode": "strict", "name": "" })).unwrap();

        let errs = |record: &Record| {
            field_type
                .validate("name", &json!(""), &Value::Null, Some(record), &Value::Null)
                .len()
        };
        assert_eq!(errs(&lax), 0);
        assert_eq!(errs(&strict), 1);
        assert!(field_type.required(&strict));
        assert!(!field_type.required(&lax));
    }

    #[test]
    fn test_length_validators_ignore_falsy_values() {
        let field_type = FieldType::new().with().min_length(3).and().max_length(5);
        assert!(errors_for(&field_type, json!("")).is_empty());
        assert!(errors_for(&field_type, json!(null)).is_empty());
        assert_eq!(errors_for(&field_type, json!("ab")), vec!["min-length"]);
        assert_eq!(errors_for(&field_type, json!("abcdef")), vec!["max-length"]);
        assert!(errors_for(&field_type, json!("abcd")).is_empty());
        assert_eq!(field_type.min_length(), Some(3));
        assert_eq!(field_type.max_length(), 5);
    }

    #[test]
    fn test_errors_follow_validator_registration_order() {
        let field_type = FieldType::new()
            .with()
            .validator(Validator::new("first", |_| false))
            .and()
            .required()
            .and()
            .validator(Validator::new("last", |_| false));
        assert_eq!(errors_for(&field_type, json!("")), vec!["first", "required", "last"]);
    }

    #[test]
    fn test_default_value_resolution() {
        let plain = FieldType::new();
        assert_eq!(plain.default_value(None), json!(""));
        assert_eq!(plain.default_value(Some(json!("given"))), json!("given"));

        let zero = FieldType::new().with().default_value(json!(0));
        assert_eq!(zero.default_value(None), json!(0));
        let no = FieldType::new().with().default_value(json!(false));
        assert_eq!(no.default_value(None), json!(false));

        let multi = FieldType::new().with().multiple_values(1, 3);
        assert_eq!(multi.default_value(Some(json!("x"))), json!("all"));
        let multi_default = multi.with().default_value(json!(["a"]));
        assert_eq!(multi_default.default_value(None), json!(["a"]));

        let range = FieldType::new().with().schema("range");
        assert_eq!(range.default_value(None), json!(["range", 0, 0]));
    }

    #[test]
    fn test_input_type_reports_unknown_types() {
        assert_eq!(FieldType::new().input_type().unwrap(), "text");
        let bogus = FieldType::new().with().input_type("telepathy");
        assert!(matches!(
            bogus.input_type(),
            Err(RecordKitError::InvalidInputType(t)) if t == "telepathy"
        ));
    }

    #[test]
    fn test_visible_requires_every_gate() {
        let record = Record::new(FieldTypeMap::new(), json!({ "a": 1 })).unwrap();
        let field_type = FieldType::new()
            .with()
            .visible_when(|_: &Record| true)
            .and()
            .visible_when(|_: &Record| false);
        assert!(!field_type.visible(&record));
        assert!(FieldType::new().visible(&record));

        let disabled = FieldType::new().with().disabled_when(|_: &Record| true);
        assert!(disabled.is_disabled(&record));
        assert!(!FieldType::new().is_disabled(&record));
    }

    #[test]
    fn test_labels_fold_in_order() {
        let field_type = FieldType::new()
            .with()
            .label("Amount")
            .and()
            .label_with(|_, so_far: String| format!("{so_far} (USD)"));
        assert_eq!(field_type.label(None), "Amount (USD)");
        assert_eq!(field_type.info(), &["label: \"Amount\"", "label (function): <closure>"]);
    }

    #[test]
    fn test_reducer_sum_and_cell_classes() {
        let field_type = FieldType::new()
            .with()
            .reducer(Reducer::Sum)
            .and()
            .cell_class("numeric")
            .and()
            .conditional_cell_class(|v: &Value| v.as_i64().unwrap_or(0) < 0, "negative");
        assert_eq!(field_type.aggregate(&[json!(1), json!(2), json!(3)]), json!(6));
        assert_eq!(field_type.cell_classes(&json!(-1)), vec!["numeric", "negative"]);
        assert_eq!(field_type.cell_classes(&json!(1)), vec!["numeric"]);
        assert_eq!(FieldType::new().aggregate(&[json!(1)]), json!(""));
    }

    #[test]
    fn test_input_mask_only_checks_single_characters() {
        let digits = FieldType::new()
            .with()
            .input_mask(regex::Regex::new("[0-9]").unwrap());
        assert!(digits.allow_input_char("7"));
        assert!(!digits.allow_input_char("x"));
        assert!(digits.allow_input_char("pasted text"));
    }

    #[tokio::test]
    async fn test_options_without_config_resolve_empty() {
        let options = FieldType::new().options(None).await.unwrap();
        assert!(options.is_empty());
    }

    #[tokio::test]
    async fn test_options_map_sort_and_filter() {
        let field_type = FieldType::new().with().options(
            OptionsConfig::data(vec![
                json!({ "name": "Zed", "id": 3 }),
                json!({ "name": "Amy", "id": 1 }),
                json!({ "name": "Bob", "id": 2 }),
            ])
            .text("name")
            .value("id")
            .compare_function(|a, b| crate::util::compare_values(&a["text"], &b["text"]))
            .filter(|item, _, _| item["value"] != json!(2)),
        );

        let options = field_type.options(None).await.unwrap();
        assert_eq!(
            *options,
            vec![
                json!({ "name": "Amy", "id": 1, "text": "Amy", "value": 1 }),
                json!({ "name": "Zed", "id": 3, "text": "Zed", "value": 3 }),
            ]
        );
        // loaded options supply display text for raw values
        assert_eq!(field_type.format(&json!(3), None, FormatContext::Default), json!("Zed"));
    }

    #[tokio::test]
    async fn test_static_fetch_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let field_type = FieldType::new().with().options(OptionsConfig::fetch_static(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            async { Ok(vec![json!({ "text": "A", "value": "a" })]) }
        }));

        let first = Record::new(FieldTypeMap::new(), json!({ "k": 1 })).unwrap();
        let second = Record::new(FieldTypeMap::new(), json!({ "k": 2 })).unwrap();
        field_type.options(Some(&first)).await.unwrap();
        field_type.options(Some(&second)).await.unwrap();
        field_type.options(None).await.unwrap();

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_cache_refetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let field_type = FieldType::new().with().options(
            OptionsConfig::fetch_static(move || {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                async { Ok(vec![json!({ "text": "A", "value": "a" })]) }
            })
            .no_cache(),
        );

        field_type.options(None).await.unwrap();
        field_type.options(None).await.unwrap();

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_record_fetch_caches_by_relevant_fields() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let field_type = FieldType::new().with().options(
            OptionsConfig::fetch(move |record: Option<Record>| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                let state = record.map(|r| r.get_field("state")).unwrap_or(Value::Null);
                async move { Ok(vec![json!({ "text": state.clone(), "value": state })]) }
            })
            .fields(["state"]),
        );

        let record = Record::new(FieldTypeMap::new(), json!({ "state": "NC", "note": "" })).unwrap();
        field_type.options(Some(&record)).await.unwrap();
        record.set_field("note", json!("changed"));
        field_type.options(Some(&record)).await.unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        record.set_field("state", json!("SC"));
        let options = field_type.options(Some(&record)).await.unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(options[0]["value"], json!("SC"));
    }

    #[tokio::test]
    async fn test_datepicker_options_are_verbatim() {
        let field_type = FieldType::new()
            .with()
            .schema("datepicker")
            .and()
            .options(OptionsConfig::data(vec![json!({ "id": "today" })]));
        let options = field_type.options(None).await.unwrap();
        assert_eq!(*options, vec![json!({ "id": "today" })]);
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_as_error() {
        let field_type = FieldType::new().with().options(OptionsConfig::fetch_static(|| async {
            Err(RecordKitError::Options("unreachable".into()))
        }));
        let err = field_type.options(None).await.unwrap_err();
        assert!(matches!(err.as_ref(), RecordKitError::Options(_)));
    }

    #[tokio::test]
    async fn test_async_validators_collect_failures() {
        let field_type = FieldType::new()
            .with()
            .async_validator(AsyncValidator::new("remote-ok", |_| async { true }.boxed()))
            .and()
            .async_validator(AsyncValidator::new("remote-taken", |ctx| {
                let taken = ctx.model_value == &json!("alice");
                async move { !taken }.boxed()
            }));

        let errors = field_type
            .validate_async("user", &json!("alice"), &Value::Null, None, &Value::Null)
            .await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "remote-taken");
        assert_eq!(errors[0].field, "user");
    }

    #[test]
    fn test_copy_shares_properties_not_text_cache() {
        let base = FieldType::new().with().label("Name");
        let copied = base.copy();
        assert_eq!(copied.label(None), "Name");
        assert!(Arc::ptr_eq(&base.properties, &copied.properties));
        assert!(!Arc::ptr_eq(&base.results_text, &copied.results_text));
    }
}
