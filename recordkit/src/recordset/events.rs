use crate::error::RecordKitError;
use crate::record::Record;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordsetEventKind {
    Loading,
    Error,
    Updated,
    /// Deprecated alias of [`RecordsetEventKind::Updated`] kept for listeners
    /// that refresh on any change.
    Changed,
    CountsChanged,
    PageChanged,
    RecordAdded,
}

impl RecordsetEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            RecordsetEventKind::Loading => "loading",
            RecordsetEventKind::Error => "error",
            RecordsetEventKind::Updated => "updated",
            RecordsetEventKind::Changed => "change",
            RecordsetEventKind::CountsChanged => "counts-changed",
            RecordsetEventKind::PageChanged => "page-changed",
            RecordsetEventKind::RecordAdded => "record-added",
        }
    }
}

/// Everything a [`Recordset`](super::Recordset) announces.
#[derive(Debug, Clone)]
pub enum RecordsetEvent {
    Loading {
        loading: bool,
    },
    Error {
        error: Arc<RecordKitError>,
    },
    /// A record's value changed, or a whole column was set.
    Updated {
        record: Option<Record>,
        field: Option<String>,
    },
    Changed,
    CountsChanged,
    PageChanged,
    RecordAdded {
        record: Record,
        index: usize,
    },
}

impl RecordsetEvent {
    pub fn kind(&self) -> RecordsetEventKind {
        match self {
            RecordsetEvent::Loading { .. } => RecordsetEventKind::Loading,
            RecordsetEvent::Error { .. } => RecordsetEventKind::Error,
            RecordsetEvent::Updated { .. } => RecordsetEventKind::Updated,
            RecordsetEvent::Changed => RecordsetEventKind::Changed,
            RecordsetEvent::CountsChanged => RecordsetEventKind::CountsChanged,
            RecordsetEvent::PageChanged => RecordsetEventKind::PageChanged,
            RecordsetEvent::RecordAdded { .. } => RecordsetEventKind::RecordAdded,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}
