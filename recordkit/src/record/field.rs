use super::{Record, RecordEvent, WeakRecord};
use crate::events::{Emitter, Subscription};
use crate::field_type::{FieldType, FormatContext};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// Emitted by a [`Field`] when its raw value or validity actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    raw_value: Value,
    valid: bool,
}

struct FieldInner {
    record: WeakRecord,
    name: String,
    previous: Mutex<Snapshot>,
    emitter: Emitter<FieldChange>,
    record_subscription: Mutex<Option<Subscription>>,
}

/// Live view of one field on one record.
///
/// Listens to every record change and re-announces only when this field's
/// raw value or validity differs from the last observation. Holds the record
/// weakly; once the record is gone reads return `Null`.
#[derive(Clone)]
pub struct Field {
    inner: Arc<FieldInner>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.inner.name)
            .field("previous", &*self.inner.previous.lock())
            .finish()
    }
}

impl Field {
    pub(crate) fn new(record: &Record, name: &str) -> Self {
        let raw_value = record.get_field(name);
        let valid = record.is_value_valid(name, &raw_value);
        let inner = Arc::new(FieldInner {
            record: record.downgrade(),
            name: name.to_string(),
            previous: Mutex::new(Snapshot { raw_value, valid }),
            emitter: Emitter::new(),
            record_subscription: Mutex::new(None),
        });

        let weak: Weak<FieldInner> = Arc::downgrade(&inner);
        let subscription = record.subscribe(move |event| {
            if let (RecordEvent::Change { .. }, Some(inner)) = (event, weak.upgrade()) {
                Field { inner }.observe_record_change();
            }
        });
        *inner.record_subscription.lock() = Some(subscription);

        Self { inner }
    }

    fn observe_record_change(&self) {
        let Some(current) = self.snapshot() else {
            return;
        };
        let changed = {
            let mut previous = self.inner.previous.lock();
            if *previous == current {
                false
            } else {
                *previous = current;
                true
            }
        };
        if changed {
            self.inner.emitter.emit(&FieldChange {
                field: self.inner.name.clone(),
            });
        }
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let record = self.record()?;
        let raw_value = record.get_field(&self.inner.name);
        let valid = record.is_value_valid(&self.inner.name, &raw_value);
        Some(Snapshot { raw_value, valid })
    }

    fn remember_raw_value(&self) {
        let raw_value = self.raw_value();
        self.inner.previous.lock().raw_value = raw_value;
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn record(&self) -> Option<Record> {
        self.inner.record.upgrade()
    }

    pub fn ptr_eq(&self, other: &Field) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn field_type(&self) -> FieldType {
        self.record()
            .map(|record| record.field_type_for_field(&self.inner.name))
            .unwrap_or_default()
    }

    // ── Values ───────────────────────────────────────────────────────

    /// The printed value.
    pub fn value(&self) -> Value {
        self.record()
            .map(|record| record.print(&self.inner.name, None))
            .unwrap_or(Value::Null)
    }

    /// Parse a formatted input and store it.
    pub fn set_value(&self, input: Value) {
        if let Some(record) = self.record() {
            record.parse_and_set_field(&self.inner.name, input);
            self.remember_raw_value();
        }
    }

    pub fn raw_value(&self) -> Value {
        self.record()
            .map(|record| record.get_field(&self.inner.name))
            .unwrap_or(Value::Null)
    }

    /// Store a model value without parsing.
    pub fn set_raw_value(&self, value: Value) {
        if let Some(record) = self.record() {
            record.set_field(&self.inner.name, value);
            self.remember_raw_value();
        }
    }

    pub fn focused_input_value(&self) -> Value {
        self.formatted(FormatContext::InputFocus)
    }

    pub fn blurred_input_value(&self) -> Value {
        self.formatted(FormatContext::InputBlur)
    }

    fn formatted(&self, context: FormatContext) -> Value {
        self.record()
            .map(|record| record.get_formatted_field(&self.inner.name, context))
            .unwrap_or(Value::Null)
    }

    // ── Validation ───────────────────────────────────────────────────

    pub fn valid(&self) -> bool {
        self.record()
            .map(|record| record.is_field_valid(&self.inner.name))
            .unwrap_or(false)
    }

    pub fn invalid(&self) -> bool {
        !self.valid()
    }

    /// Whether a formatted input would be valid once parsed.
    pub fn is_valid_value(&self, input: Value) -> bool {
        let Some(record) = self.record() else {
            return false;
        };
        let parsed = record.parse(&self.inner.name, input);
        record.is_value_valid(&self.inner.name, &parsed)
    }

    pub fn allow_input_char(&self, input: &str) -> bool {
        self.field_type().allow_input_char(input)
    }

    // ── Multiple values ──────────────────────────────────────────────

    /// Handle for a child path, e.g. one item of a multi-value field.
    pub fn field(&self, name_or_index: impl fmt::Display) -> Field {
        let path = format!("{}.{}", self.inner.name, name_or_index);
        match self.record() {
            Some(record) => record.field(&path),
            None => Field {
                inner: Arc::new(FieldInner {
                    record: self.inner.record.clone(),
                    name: path,
                    previous: Mutex::new(Snapshot {
                        raw_value: Value::Null,
                        valid: false,
                    }),
                    emitter: Emitter::new(),
                    record_subscription: Mutex::new(None),
                }),
            },
        }
    }

    pub fn min_value_count(&self) -> usize {
        self.field_type().min_value_count()
    }

    pub fn max_value_count(&self) -> usize {
        self.field_type().max_value_count()
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&FieldChange) + Send + Sync + 'static,
    {
        self.inner.emitter.subscribe(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.emitter.listener_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::Validator;
    use crate::record::{field_type_map, FieldTypeMap};
    use crate::util;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reverse_and_upper_case(value: Value, _: Option<&Record>, _: FormatContext) -> Value {
        json!(util::display_string(&value).chars().rev().collect::<String>().to_uppercase())
    }

    fn reverse_and_lower_case(value: Value) -> Value {
        json!(util::display_string(&value).chars().rev().collect::<String>().to_lowercase())
    }

    fn count_changes(field: &Field) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let sub = field.on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_formats_and_parses_through_field_type() {
        let types = field_type_map([(
            "word",
            FieldType::new()
                .with()
                .formatter(reverse_and_upper_case)
                .and()
                .parser(reverse_and_lower_case),
        )]);
        let record = Record::new(types, json!({ "word": "stressed" })).unwrap();
        let field = record.field("word");

        assert_eq!(field.value(), json!("DESSERTS"));
        field.set_value(json!("DESSERTS"));
        assert_eq!(field.raw_value(), json!("stressed"));

        field.set_value(json!("LIVED"));
        assert_eq!(record.get_field("word"), json!("devil"));
    }

    #[test]
    fn test_focus_and_blur_contexts() {
        let mask = |value: Value, _: Option<&Record>, context: FormatContext| match context {
            FormatContext::InputFocus => value,
            _ => json!("*".repeat(util::display_string(&value).len())),
        };
        let types = field_type_map([("password", FieldType::new().with().formatter(mask))]);
        let record = Record::new(types, json!({ "password": "hunter2" })).unwrap();
        let field = record.field("password");

        assert_eq!(field.focused_input_value(), json!("hunter2"));
        assert_eq!(field.blurred_input_value(), json!("*******"));
        assert_eq!(field.value(), json!("*******"));
    }

    #[test]
    fn test_announces_only_its_own_changes() {
        let greater_than_other = Validator::new("greater-than-other", |ctx| {
            let other = ctx.record.map(|r| r.get_field("other")).unwrap_or(Value::Null);
            ctx.model_value.as_i64().unwrap_or(0) > other.as_i64().unwrap_or(0)
        });
        let types = field_type_map([
            ("value", FieldType::new().with().validator(greater_than_other)),
            ("other", FieldType::new()),
            ("unrelated", FieldType::new()),
        ]);
        let record = Record::new(types, json!({ "value": 5, "other": 1, "unrelated": 0 })).unwrap();
        let field = record.field("value");
        let (changes, _sub) = count_changes(&field);
        assert!(field.valid());

        field.set_raw_value(json!(6));
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        // another field flips this field's validity
        record.set_field("other", json!(10));
        assert!(field.invalid());
        assert_eq!(changes.load(Ordering::SeqCst), 2);

        record.set_field("unrelated", json!(1));
        record.set_field("value", json!(6));
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_is_valid_value_parses_first() {
        let numbers_only = Validator::new("numbers-only", |ctx| ctx.model_value.is_number());
        let types = field_type_map([(
            "age",
            FieldType::new()
                .with()
                .parser(|v: Value| {
                    util::display_string(&v)
                        .parse::<i64>()
                        .map(Value::from)
                        .unwrap_or(v)
                })
                .and()
                .validator(numbers_only),
        )]);
        let record = Record::new(types, json!({ "age": 30 })).unwrap();
        let field = record.field("age");

        assert!(field.is_valid_value(json!("42")));
        assert!(!field.is_valid_value(json!("forty-two")));
        assert_eq!(record.get_field("age"), json!(30));
    }

    #[test]
    fn test_child_fields_of_multiple_values() {
        let types = field_type_map([(
            "employees",
            FieldType::new().with().multiple_values(1, 3),
        )]);
        let record = Record::new(types, json!({ "employees": ["Jim", "Dwight"] })).unwrap();
        let employees = record.field("employees");
        let first = employees.field(0);

        assert_eq!(first.name(), "employees.0");
        assert_eq!(first.raw_value(), json!("Jim"));
        assert_eq!(employees.min_value_count(), 1);
        assert_eq!(employees.max_value_count(), 3);

        let (changes, _sub) = count_changes(&first);
        first.set_raw_value(json!("Pam"));
        assert_eq!(record.get_field("employees"), json!(["Pam", "Dwight"]));
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reads_null_after_record_is_dropped() {
        let record = Record::new(FieldTypeMap::new(), json!({ "a": 1 })).unwrap();
        let field = record.field("a");
        assert_eq!(record.listener_count(), 1);
        drop(record);
        assert_eq!(field.raw_value(), Value::Null);
        assert!(field.record().is_none());
    }
}
