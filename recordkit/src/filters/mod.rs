//! Record predicates for [`Recordset::set_filter`](crate::recordset::Recordset::set_filter).
//!
//! Text comparisons are case-insensitive. A filter over a field the record
//! does not have lets the record through, except [`contains`], which checks
//! the printed value.

use crate::record::Record;
use crate::util;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

pub type RecordFilter = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Wrap a closure as a [`RecordFilter`].
pub fn filter<F>(f: F) -> RecordFilter
where
    F: Fn(&Record) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Passes every record.
pub fn always() -> RecordFilter {
    filter(|_: &Record| true)
}

/// Passes when every filter passes.
pub fn and(filters: Vec<RecordFilter>) -> RecordFilter {
    filter(move |record: &Record| filters.iter().all(|f| f(record)))
}

/// Passes when any filter passes. An empty list passes everything.
pub fn or(filters: Vec<RecordFilter>) -> RecordFilter {
    filter(move |record: &Record| filters.is_empty() || filters.iter().any(|f| f(record)))
}

/// The printed value of `key` contains `substring`.
pub fn contains(key: impl Into<String>, substring: impl Into<String>) -> RecordFilter {
    let key = key.into();
    let substring = substring.into().to_lowercase();
    filter(move |record: &Record| {
        if substring.is_empty() {
            return true;
        }
        match record.print(&key, None) {
            Value::Null => false,
            printed => util::display_string(&printed)
                .to_lowercase()
                .contains(&substring),
        }
    })
}

/// The value of `key` equals `test`. An empty test string passes everything,
/// as does a pair of falsy values.
pub fn equals(key: impl Into<String>, test: Value) -> RecordFilter {
    let key = key.into();
    filter(move |record: &Record| {
        if test == Value::String(String::new()) {
            return true;
        }
        let Some(value) = record.get_field_opt(&key) else {
            return true;
        };
        if !util::is_truthy(&value) && !util::is_truthy(&test) {
            return true;
        }
        match (&value, &test) {
            (Value::String(a), Value::String(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => value == test,
        }
    })
}

/// `start <= value <= end`, in [`util::compare_values`] order.
pub fn between(key: impl Into<String>, start: Value, end: Value) -> RecordFilter {
    let key = key.into();
    filter(move |record: &Record| {
        let Some(value) = record.get_field_opt(&key) else {
            return true;
        };
        util::compare_values(&start, &value) != Ordering::Greater
            && util::compare_values(&value, &end) != Ordering::Greater
    })
}

/// The value of `key` equals one of `values`. An empty list passes everything.
pub fn contains_any<I, S>(key: impl Into<String>, values: I) -> RecordFilter
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let key = key.into();
    let values: Vec<String> = values.into_iter().map(|v| v.as_ref().to_lowercase()).collect();
    filter(move |record: &Record| {
        let Some(value) = record.get_field_opt(&key) else {
            return true;
        };
        if values.is_empty() {
            return true;
        }
        let value = util::display_string(&value).to_lowercase();
        values.iter().any(|candidate| *candidate == value)
    })
}

/// Records with at least one validation error.
pub fn invalid() -> RecordFilter {
    filter(|record: &Record| record.has_errors())
}
