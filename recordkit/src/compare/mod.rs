use crate::record::{FieldTypeMap, Record};
use crate::util;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

pub type RecordComparator = Arc<dyn Fn(&Record, &Record) -> Ordering + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
    #[serde(rename = "UNSORTED")]
    Unsorted,
}

/// One entry of a recordset's sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn {
    pub field: String,
    pub sort: SortDirection,
}

impl SortColumn {
    pub fn new(field: impl Into<String>, sort: SortDirection) -> Self {
        Self {
            field: field.into(),
            sort,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Descending)
    }
}

/// First non-equal result among `comparators`, in order.
pub fn multicomparator(comparators: Vec<RecordComparator>) -> RecordComparator {
    Arc::new(move |a: &Record, b: &Record| {
        comparators
            .iter()
            .map(|compare| compare(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    })
}

/// Comparator for a list of sort columns. Each column compares with its field
/// type's compare function, reversed when descending. Unsorted columns are
/// skipped.
pub fn comparator_from_columns(columns: &[SortColumn], field_types: &FieldTypeMap) -> RecordComparator {
    let comparators = columns
        .iter()
        .filter(|column| column.sort != SortDirection::Unsorted)
        .map(|column| {
            let field = column.field.clone();
            let descending = column.sort == SortDirection::Descending;
            let field_type = field_types.get(&field).cloned();
            Arc::new(move |a: &Record, b: &Record| {
                let (a, b) = (a.get_field(&field), b.get_field(&field));
                let ordering = match &field_type {
                    Some(field_type) => field_type.compare(&a, &b),
                    None => util::compare_values(&a, &b),
                };
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }) as RecordComparator
        })
        .collect();
    multicomparator(comparators)
}
