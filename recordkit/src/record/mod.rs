pub mod field;

pub use field::{Field, FieldChange};

use crate::error::{RecordKitError, Result};
use crate::events::{Emitter, Subscription};
use crate::field_type::{FieldType, FormatContext, ValidationError};
use crate::util;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Field name to field type, in declaration order.
pub type FieldTypeMap = IndexMap<String, FieldType>;

/// Build a [`FieldTypeMap`] from `(name, type)` pairs.
pub fn field_type_map<I, K>(entries: I) -> FieldTypeMap
where
    I: IntoIterator<Item = (K, FieldType)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// What kind of object the record's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    /// A plain map of values.
    Plain,
    /// A serialized domain type, named by its Rust type name.
    Typed(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    Change { field: String },
    Blur { field: String },
}

struct RecordInner {
    id: u64,
    field_types: RwLock<Arc<FieldTypeMap>>,
    values: Mutex<Value>,
    initial_values: Value,
    backing: Backing,
    fields: Mutex<HashMap<String, Field>>,
    emitter: Emitter<RecordEvent>,
}

/// One row of values bound to a map of field types.
///
/// A `Record` is a shared handle: clones refer to the same row, and equality
/// is identity. Use [`Record::duplicate`] for an independent copy.
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

/// Non-owning reference to a [`Record`].
#[derive(Clone)]
pub struct WeakRecord {
    inner: Weak<RecordInner>,
}

impl WeakRecord {
    pub fn upgrade(&self) -> Option<Record> {
        self.inner.upgrade().map(|inner| Record { inner })
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.inner.id)
            .field("values", &*self.inner.values.lock())
            .finish()
    }
}

impl Record {
    /// Create a record over plain values. Null values are a caller error.
    pub fn new(field_types: impl Into<Arc<FieldTypeMap>>, values: Value) -> Result<Self> {
        Self::with_backing(field_types.into(), values, Backing::Plain)
    }

    /// Create a record from a serializable domain value.
    pub fn from_serializable<T: Serialize>(
        field_types: impl Into<Arc<FieldTypeMap>>,
        values: &T,
    ) -> Result<Self> {
        let values = serde_json::to_value(values)?;
        Self::with_backing(
            field_types.into(),
            values,
            Backing::Typed(std::any::type_name::<T>()),
        )
    }

    pub(crate) fn with_backing(
        field_types: Arc<FieldTypeMap>,
        values: Value,
        backing: Backing,
    ) -> Result<Self> {
        if values.is_null() {
            let fields: Vec<String> = field_types.keys().cloned().collect();
            log::error!("Record created without values (fields: {fields:?})");
            return Err(RecordKitError::MissingValues { fields });
        }

        Ok(Self {
            inner: Arc::new(RecordInner {
                id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
                field_types: RwLock::new(field_types),
                initial_values: values.clone(),
                values: Mutex::new(values),
                backing,
                fields: Mutex::new(HashMap::new()),
                emitter: Emitter::new(),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn downgrade(&self) -> WeakRecord {
        WeakRecord {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn backing(&self) -> Backing {
        self.inner.backing
    }

    /// Snapshot of the current values.
    pub fn values(&self) -> Value {
        self.inner.values.lock().clone()
    }

    pub fn initial_values(&self) -> &Value {
        &self.inner.initial_values
    }

    /// Deserialize the current values back into a domain type.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.values())?)
    }

    pub fn has_changed(&self) -> bool {
        *self.inner.values.lock() != self.inner.initial_values
    }

    pub fn field_types(&self) -> Arc<FieldTypeMap> {
        Arc::clone(&self.inner.field_types.read())
    }

    pub fn set_field_types(&self, field_types: Arc<FieldTypeMap>) {
        *self.inner.field_types.write() = field_types;
    }

    fn keys(&self) -> Vec<String> {
        match &*self.inner.values.lock() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    // ── Values ───────────────────────────────────────────────────────

    /// Value at a dotted path, or `Null` when absent.
    pub fn get_field(&self, field: &str) -> Value {
        self.get_field_opt(field).unwrap_or(Value::Null)
    }

    pub fn get_field_opt(&self, field: &str) -> Option<Value> {
        util::get_path(&self.inner.values.lock(), field).cloned()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.get_field_opt(field).is_some()
    }

    /// Write a value at a dotted path and announce the change.
    pub fn set_field(&self, field: &str, value: Value) {
        let written = util::set_path(&mut self.inner.values.lock(), field, value);
        if !written {
            log::warn!("Cannot set '{field}' on record {}: path is not writable", self.inner.id);
            return;
        }
        self.announce_change(field);
    }

    pub fn set_fields<I, K>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (field, value) in fields {
            self.set_field(field.as_ref(), value);
        }
    }

    pub fn parse_and_set_field(&self, field: &str, formatted: Value) {
        let parsed = self.field_type_for_field(field).parse(formatted);
        self.set_field(field, parsed);
    }

    pub fn get_formatted_field(&self, field: &str, context: FormatContext) -> Value {
        let value = self.get_field(field);
        self.field_type_for_field(field).format(&value, Some(self), context)
    }

    /// Printed value of a field, or of one item when the field holds a list.
    pub fn print(&self, field: &str, index: Option<usize>) -> Value {
        let value = self.get_field(field);
        let value = match index {
            Some(i) => value.get(i).cloned().unwrap_or(Value::Null),
            None => value,
        };
        self.field_type_for_field(field).print(&value, Some(self))
    }

    pub fn parse(&self, field: &str, value: Value) -> Value {
        self.field_type_for_field(field).parse(value)
    }

    pub fn add_field(&self, field: &str, field_type: FieldType, value: Value) {
        {
            let mut field_types = self.inner.field_types.write();
            let mut updated = (**field_types).clone();
            updated.insert(field.to_string(), field_type);
            *field_types = Arc::new(updated);
        }
        if let Value::Object(map) = &mut *self.inner.values.lock() {
            map.insert(field.to_string(), value);
        }
        self.announce_change(field);
    }

    /// Restore the values captured at construction.
    pub fn reset(&self) {
        *self.inner.values.lock() = self.inner.initial_values.clone();
        for field in self.keys() {
            self.announce_change(&field);
        }
    }

    /// Replace every value with its field type's default.
    pub fn clear(&self) {
        let defaults: Map<String, Value> = self
            .field_types()
            .iter()
            .map(|(name, field_type)| (name.clone(), field_type.default_value(None)))
            .collect();
        *self.inner.values.lock() = Value::Object(defaults);
        for field in self.keys() {
            self.announce_change(&field);
        }
    }

    // ── Field types ──────────────────────────────────────────────────

    /// Field type for a (possibly dotted) field. A dotted path resolves to the
    /// parent's part when the parent is composite, otherwise to the parent's
    /// own type. Unknown fields get a default field type.
    pub fn field_type_for_field(&self, field: &str) -> FieldType {
        if let Some((parent, rest)) = field.split_once('.') {
            let child = rest.split('.').next().unwrap_or(rest);
            let parent_type = self.field_types().get(parent).cloned();
            return match parent_type {
                Some(parent_type) if parent_type.has_parts() => {
                    parent_type.part(child).cloned().unwrap_or_default()
                }
                _ => self.field_type_for_field(parent),
            };
        }
        self.field_types().get(field).cloned().unwrap_or_default()
    }

    pub fn allow_input_char(&self, field: &str, input: &str) -> bool {
        self.field_type_for_field(field).allow_input_char(input)
    }

    /// The cached live handle for a field.
    pub fn field(&self, name: &str) -> Field {
        if let Some(field) = self.inner.fields.lock().get(name) {
            return field.clone();
        }
        let created = Field::new(self, name);
        self.inner
            .fields
            .lock()
            .entry(name.to_string())
            .or_insert(created)
            .clone()
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Every validation error across the record's values. Composite fields
    /// are validated part by part.
    pub fn errors(&self) -> Vec<ValidationError> {
        let values = self.values();
        let Value::Object(map) = &values else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        for (key, value) in map {
            let field_type = self.field_type_for_field(key);
            if field_type.has_parts() {
                for part in field_type.parts() {
                    let part_value = value.get(&part.key).unwrap_or(&Value::Null);
                    errors.extend(part.field_type.validate(
                        &part.key,
                        part_value,
                        &Value::Null,
                        Some(self),
                        &Value::Null,
                    ));
                }
            } else {
                errors.extend(field_type.validate(key, value, &Value::Null, Some(self), &Value::Null));
            }
        }
        errors
    }

    pub fn error_count(&self) -> usize {
        self.errors().len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn is_field_valid(&self, field: &str) -> bool {
        self.is_value_valid(field, &self.get_field(field))
    }

    /// Whether `value` would pass the field's validators on this record.
    pub fn is_value_valid(&self, field: &str, value: &Value) -> bool {
        self.field_type_for_field(field)
            .validate(field, value, &Value::Null, Some(self), &Value::Null)
            .is_empty()
    }

    /// `"<label>: <validator>"` for every error.
    pub fn readable_record_errors(&self) -> Vec<String> {
        self.errors()
            .into_iter()
            .map(|error| {
                let label = self.field_type_for_field(&error.field).label(Some(self));
                format!("{label}: {}", error.name)
            })
            .collect()
    }

    /// `"<label> <validator>"` for each error on one field.
    pub fn readable_field_errors(&self, field: &str) -> Vec<String> {
        let field_type = self.field_type_for_field(field);
        let label = field_type.label(Some(self));
        field_type
            .validate(field, &self.get_field(field), &Value::Null, Some(self), &Value::Null)
            .into_iter()
            .map(|error| format!("{label} {}", error.name))
            .collect()
    }

    /// Declared fields whose current value fails validation.
    pub fn invalid_values(&self) -> Vec<String> {
        self.field_types()
            .keys()
            .filter(|field| !self.is_field_valid(field))
            .cloned()
            .collect()
    }

    /// False when a required field holds a falsy value other than zero.
    pub fn has_required_values(&self) -> bool {
        !self.field_types().iter().any(|(field, field_type)| {
            if !field_type.required(self) {
                return false;
            }
            let value = self.get_field(field);
            if util::is_truthy(&value) {
                return false;
            }
            log::warn!("{field} is required and has a falsy value of {value}");
            value.as_f64() != Some(0.0)
        })
    }

    // ── Copies and fingerprints ──────────────────────────────────────

    /// Independent copy sharing the field types. Values of fields without a
    /// field type are reset to their default.
    pub fn duplicate(&self) -> Record {
        let keys: Vec<String> = self.field_types().keys().cloned().collect();
        self.duplicate_fields(&keys)
    }

    /// Independent copy keeping only `fields`; every other value is reset to
    /// its field type's default. Typed records are copied whole.
    pub fn duplicate_fields<S: AsRef<str>>(&self, fields: &[S]) -> Record {
        let values = self.values();
        let copied = match (self.inner.backing, values) {
            (Backing::Plain, Value::Object(map)) => Value::Object(
                map.into_iter()
                    .map(|(name, value)| {
                        if fields.iter().any(|f| f.as_ref() == name) {
                            (name, value)
                        } else {
                            let default = self.field_type_for_field(&name).default_value(None);
                            (name, default)
                        }
                    })
                    .collect(),
            ),
            (_, other) => other,
        };

        Record {
            inner: Arc::new(RecordInner {
                id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
                field_types: RwLock::new(self.field_types()),
                initial_values: copied.clone(),
                values: Mutex::new(copied),
                backing: self.inner.backing,
                fields: Mutex::new(HashMap::new()),
                emitter: Emitter::new(),
            }),
        }
    }

    /// Stable JSON fingerprint of `[key, value]` pairs, limited to `fields`
    /// when given.
    pub fn hash_of_fields<S: AsRef<str>>(&self, fields: Option<&[S]>) -> String {
        let values = self.inner.values.lock();
        let entries: Vec<Value> = match &*values {
            Value::Object(map) => map
                .iter()
                .filter(|(key, _)| {
                    fields.map_or(true, |fields| fields.iter().any(|f| f.as_ref() == key.as_str()))
                })
                .map(|(key, value)| Value::Array(vec![Value::String(key.clone()), value.clone()]))
                .collect(),
            _ => Vec::new(),
        };
        Value::Array(entries).to_string()
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RecordEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.subscribe(listener)
    }

    /// Listen for value changes; the callback receives the changed field.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let RecordEvent::Change { field } = event {
                listener(field);
            }
        })
    }

    pub fn announce_change(&self, field: &str) {
        self.inner.emitter.emit(&RecordEvent::Change {
            field: field.to_string(),
        });
    }

    pub fn announce_blur(&self, field: &str) {
        self.inner.emitter.emit(&RecordEvent::Blur {
            field: field.to_string(),
        });
    }

    pub fn listener_count(&self) -> usize {
        self.inner.emitter.listener_count()
    }
}
