//! Paginated, sorted, filtered collections of [`Record`]s.
//!
//! A [`Recordset`] pulls rows from a [`Fetch`] source and keeps two lists: every
//! record in fetch order, and the filtered and sorted view that pages are cut
//! from. When the total count reported by the source equals the number of
//! rows held, the set is client-side and pages, sorting and filtering are
//! computed locally. Otherwise it is server-side: every update re-fetches and
//! the fetched rows are taken to be exactly the current page.
//!
//! Setters that change the view schedule an update through a debounce timer.
//! [`Recordset::request_update`] is single-flight: callers that arrive while an
//! update is running share it.

mod debounce;
pub mod events;
pub mod example;
pub mod fetch;

pub use events::{RecordsetEvent, RecordsetEventKind};
pub use fetch::{Fetch, FetchArgs, FetchFuture, FetchResponse};

use crate::compare::{comparator_from_columns, SortColumn, SortDirection};
use crate::error::{RecordKitError, Result};
use crate::events::{Emitter, Subscription};
use crate::field_type::FieldType;
use crate::filters::{self, RecordFilter};
use crate::record::{Backing, FieldTypeMap, Record, RecordEvent};
use debounce::DebounceTimer;
use futures::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Shared handle to one pending or running update.
pub type UpdateFuture = Shared<BoxFuture<'static, ()>>;

const DEFAULT_PAGE_SIZE: usize = 10;

type RecordsetValidateFn = Arc<dyn Fn(&[Record]) -> bool + Send + Sync>;

/// A named check over every record in a set.
#[derive(Clone)]
pub struct RecordsetValidator {
    pub name: String,
    pub validate: RecordsetValidateFn,
}

impl RecordsetValidator {
    pub fn new<F>(name: impl Into<String>, validate: F) -> Self
    where
        F: Fn(&[Record]) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            validate: Arc::new(validate),
        }
    }
}

struct State {
    field_types: Arc<FieldTypeMap>,
    records: Vec<Record>,
    sorted_filtered: Vec<Record>,
    page_index: usize,
    page_size: usize,
    sort_columns: Vec<SortColumn>,
    filter: RecordFilter,
    parameters: Value,
    total_count: usize,
    summary: Option<String>,
    /// Rows inserted since the last update, shown past the page boundary.
    extra_row_count: usize,
    is_loading: bool,
    is_fetch_needed: bool,
    is_first_fetch: bool,
    is_clone: bool,
    original_data: Option<FetchResponse>,
    validators: Vec<RecordsetValidator>,
    debounce_interval: Duration,
    /// Record id to the subscription forwarding its changes.
    listening_to: IndexMap<u64, Subscription>,
}

impl State {
    fn is_client_side(&self) -> bool {
        self.total_count != 0 && self.total_count == self.records.len()
    }

    fn fetch_needed(&self) -> bool {
        self.is_fetch_needed || !self.is_client_side()
    }

    fn filtered_count(&self) -> usize {
        if self.is_client_side() {
            self.sorted_filtered.len()
        } else {
            self.total_count
        }
    }

    fn fetch_args(&self) -> FetchArgs {
        FetchArgs {
            parameters: self.parameters.clone(),
            start_index: self.page_index.saturating_mul(self.page_size),
            page_size: self.page_size,
            page: self.page_index + 1,
            sort: self.sort_columns.clone(),
            is_first_fetch: self.is_first_fetch,
        }
    }
}

struct RecordsetInner {
    state: Mutex<State>,
    fetch: Fetch,
    emitter: Emitter<RecordsetEvent>,
    debounce: DebounceTimer,
    in_flight: Mutex<Option<UpdateFuture>>,
    updated: watch::Sender<u64>,
}

/// Shared handle to a paginated collection of records.
#[derive(Clone)]
pub struct Recordset {
    inner: Arc<RecordsetInner>,
}

impl fmt::Debug for Recordset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Recordset")
            .field("records", &state.records.len())
            .field("total_count", &state.total_count)
            .field("page_index", &state.page_index)
            .field("page_size", &state.page_size)
            .field("sort_columns", &state.sort_columns)
            .finish()
    }
}

impl Recordset {
    pub fn new(field_types: impl Into<Arc<FieldTypeMap>>, fetch: Fetch) -> Self {
        let (updated, _) = watch::channel(0);
        Self {
            inner: Arc::new(RecordsetInner {
                state: Mutex::new(State {
                    field_types: field_types.into(),
                    records: Vec::new(),
                    sorted_filtered: Vec::new(),
                    page_index: 0,
                    page_size: DEFAULT_PAGE_SIZE,
                    sort_columns: Vec::new(),
                    filter: filters::always(),
                    parameters: Value::Object(Map::new()),
                    total_count: 0,
                    summary: None,
                    extra_row_count: 0,
                    is_loading: false,
                    is_fetch_needed: true,
                    is_first_fetch: true,
                    is_clone: false,
                    original_data: None,
                    validators: Vec::new(),
                    debounce_interval: Duration::ZERO,
                    listening_to: IndexMap::new(),
                }),
                fetch,
                emitter: Emitter::new(),
                debounce: DebounceTimer::new(),
                in_flight: Mutex::new(None),
                updated,
            }),
        }
    }

    /// Quiet window between a view change and the update it schedules.
    pub fn with_debounce_interval(self, interval: Duration) -> Self {
        self.set_debounce_interval(interval);
        self
    }

    pub fn set_debounce_interval(&self, interval: Duration) {
        self.inner.state.lock().debounce_interval = interval;
    }

    pub fn debounce_interval(&self) -> Duration {
        self.inner.state.lock().debounce_interval
    }

    pub fn ptr_eq(&self, other: &Recordset) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── View state ───────────────────────────────────────────────────

    pub fn page_index(&self) -> usize {
        self.inner.state.lock().page_index
    }

    pub fn set_page_index(&self, index: usize) {
        self.inner.state.lock().page_index = index;
        self.queue_update();
    }

    /// One-based page number.
    pub fn page_number(&self) -> usize {
        self.page_index() + 1
    }

    pub fn set_page_number(&self, number: usize) {
        self.set_page_index(number.saturating_sub(1));
    }

    pub fn page_size(&self) -> usize {
        self.inner.state.lock().page_size
    }

    pub fn set_page_size(&self, size: usize) {
        {
            let mut state = self.inner.state.lock();
            state.page_index = 0;
            state.page_size = size;
        }
        self.queue_update();
    }

    /// Set the page size without scheduling an update.
    pub fn set_initial_page_size(&self, size: usize) {
        self.inner.state.lock().page_size = size;
    }

    pub fn sort_columns(&self) -> Vec<SortColumn> {
        self.inner.state.lock().sort_columns.clone()
    }

    pub fn set_sort_columns(&self, columns: Vec<SortColumn>) {
        {
            let mut state = self.inner.state.lock();
            state.page_index = 0;
            state.sort_columns = columns;
        }
        self.queue_update();
    }

    /// Move `column` to the front of the sort order, or drop it when unsorted.
    pub fn sort(&self, column: SortColumn) {
        let mut columns: Vec<SortColumn> = self
            .sort_columns()
            .into_iter()
            .filter(|c| c.field != column.field)
            .collect();
        if column.sort != SortDirection::Unsorted {
            columns.insert(0, column);
        }
        self.set_sort_columns(columns);
    }

    pub fn filter(&self) -> RecordFilter {
        Arc::clone(&self.inner.state.lock().filter)
    }

    pub fn set_filter(&self, filter: RecordFilter) {
        {
            let mut state = self.inner.state.lock();
            state.page_index = 0;
            state.filter = filter;
        }
        self.queue_update();
    }

    pub fn parameters(&self) -> Value {
        self.inner.state.lock().parameters.clone()
    }

    /// Replace the query parameters. The scheduled update always re-fetches.
    pub fn set_parameters(&self, parameters: Value) {
        {
            let mut state = self.inner.state.lock();
            state.page_index = 0;
            state.parameters = parameters;
            state.is_fetch_needed = true;
        }
        self.queue_update();
    }

    // ── Derived state ────────────────────────────────────────────────

    /// Every record, in fetch and insertion order.
    pub fn all_records(&self) -> Vec<Record> {
        self.inner.state.lock().records.clone()
    }

    pub fn sorted_filtered_records(&self) -> Vec<Record> {
        self.inner.state.lock().sorted_filtered.clone()
    }

    /// Records on the current page. Server-side sets return every fetched row.
    pub fn current_page(&self) -> Vec<Record> {
        let state = self.inner.state.lock();
        if !state.is_client_side() {
            return state.sorted_filtered.clone();
        }
        let len = state.sorted_filtered.len();
        let start = state.page_index.saturating_mul(state.page_size).min(len);
        let end = start
            .saturating_add(state.page_size)
            .saturating_add(state.extra_row_count)
            .min(len);
        state.sorted_filtered[start..end].to_vec()
    }

    pub fn total_count(&self) -> usize {
        self.inner.state.lock().total_count
    }

    pub fn filtered_count(&self) -> usize {
        self.inner.state.lock().filtered_count()
    }

    pub fn filtered_record_count(&self) -> usize {
        self.inner.state.lock().sorted_filtered.len()
    }

    pub fn is_client_side(&self) -> bool {
        self.inner.state.lock().is_client_side()
    }

    pub fn is_server_side(&self) -> bool {
        !self.is_client_side()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading
    }

    pub fn is_clone(&self) -> bool {
        self.inner.state.lock().is_clone
    }

    pub fn is_fetch_needed(&self) -> bool {
        self.inner.state.lock().fetch_needed()
    }

    pub fn first_record_number_on_page(&self) -> usize {
        let state = self.inner.state.lock();
        state.page_index.saturating_mul(state.page_size).saturating_add(1)
    }

    pub fn last_record_number_on_page(&self) -> usize {
        let state = self.inner.state.lock();
        state
            .page_index
            .saturating_add(1)
            .saturating_mul(state.page_size)
            .min(state.filtered_count())
    }

    pub fn page_count(&self) -> usize {
        let state = self.inner.state.lock();
        if state.page_size == 0 {
            return 0;
        }
        state.filtered_count().div_ceil(state.page_size)
    }

    pub fn last_record_index(&self) -> usize {
        self.total_count()
    }

    pub fn is_last_record(&self, record: &Record) -> bool {
        let state = self.inner.state.lock();
        let filtered = state.filtered_count();
        state
            .records
            .iter()
            .position(|r| r == record)
            .is_some_and(|index| filtered > 0 && index == filtered - 1)
    }

    pub fn summary(&self) -> Option<String> {
        self.inner.state.lock().summary.clone()
    }

    pub fn set_summary(&self, summary: Option<String>) {
        self.inner.state.lock().summary = summary;
    }

    pub fn has_changed(&self) -> bool {
        self.all_records().iter().any(Record::has_changed)
    }

    // ── Field types ──────────────────────────────────────────────────

    pub fn field_types(&self) -> Arc<FieldTypeMap> {
        Arc::clone(&self.inner.state.lock().field_types)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.field_types().keys().cloned().collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.field_types().contains_key(field)
    }

    /// The field's type, or a default one when the field is not declared.
    pub fn get_field_type(&self, field: &str) -> FieldType {
        self.field_types().get(field).cloned().unwrap_or_default()
    }

    // ── Updates ──────────────────────────────────────────────────────

    /// Fetch if needed, then rebuild the filtered and sorted view and announce
    /// it. A failed fetch is reported as an [`RecordsetEvent::Error`]; the
    /// previous rows stay in place.
    pub async fn update(&self) {
        let args = {
            let mut state = self.inner.state.lock();
            state.is_loading = true;
            if state.fetch_needed() {
                state.is_fetch_needed = false;
                Some(state.fetch_args())
            } else {
                None
            }
        };

        if let Some(args) = args {
            log::debug!("Recordset fetching page {} ({} rows)", args.page, args.page_size);
            self.emit(RecordsetEvent::Loading { loading: true });
            let outcome = match self.inner.fetch.call(args).await {
                Ok(response) => self.hydrate(response),
                Err(error) => Err(error),
            };
            if let Err(error) = outcome {
                log::error!("Recordset fetch failed: {error}");
                self.inner.state.lock().is_loading = false;
                self.emit(RecordsetEvent::Error {
                    error: Arc::new(error),
                });
            }
            self.emit(RecordsetEvent::Loading { loading: false });
        }

        {
            let mut state = self.inner.state.lock();
            state.extra_row_count = 0;
            state.is_loading = false;
        }
        self.sort_and_filter();
        self.dispatch_update_events();
    }

    /// Start an update, or join the one already running.
    ///
    /// The update is spawned on the current Tokio runtime, so it completes even
    /// if the returned future is dropped.
    pub fn request_update(&self) -> UpdateFuture {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(pending) = in_flight.as_ref() {
            return pending.clone();
        }

        let recordset = self.clone();
        let pending = async move {
            recordset.update().await;
            *recordset.inner.in_flight.lock() = None;
        }
        .boxed()
        .shared();
        *in_flight = Some(pending.clone());
        drop(in_flight);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(pending.clone());
            }
            Err(_) => log::warn!("No Tokio runtime available; update runs only when awaited"),
        }
        pending
    }

    /// Wait out the debounce interval, then update, re-fetching even when the
    /// data is held locally.
    pub async fn request_hard_update(&self) {
        self.inner.state.lock().is_fetch_needed = true;
        self.debounced_update().await;
    }

    /// Wait out the debounce interval, then update from the rows already held
    /// when the set is client-side.
    pub async fn request_soft_update(&self) {
        self.debounced_update().await;
    }

    async fn debounced_update(&self) {
        tokio::time::sleep(self.debounce_interval()).await;
        self.request_update().await;
    }

    /// Resolves after the next update finishes announcing itself.
    pub fn updating(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut updated = self.inner.updated.subscribe();
        async move {
            let _ = updated.changed().await;
        }
    }

    fn queue_update(&self) {
        let recordset = Arc::downgrade(&self.inner);
        self.inner.debounce.schedule(self.debounce_interval(), async move {
            if let Some(inner) = recordset.upgrade() {
                let _ = Recordset { inner }.request_update();
            }
        });
    }

    fn hydrate(&self, response: FetchResponse) -> Result<()> {
        let (field_types, page_size) = {
            let state = self.inner.state.lock();
            (Arc::clone(&state.field_types), state.page_size)
        };
        let original = response.clone();
        let (data, total_count, summary) = response.into_parts();

        let records = data
            .into_iter()
            .map(|values| Record::with_backing(Arc::clone(&field_types), values, Backing::Plain))
            .collect::<Result<Vec<_>>>()?;
        if total_count != records.len() && records.len() > page_size {
            log::warn!(
                "Server-side fetch returned {} rows for a page of {page_size}",
                records.len()
            );
        }

        let detached = {
            let mut state = self.inner.state.lock();
            state.summary = summary;
            state.total_count = total_count;
            state.records = records.clone();
            if state.is_first_fetch && state.original_data.is_none() {
                state.original_data = Some(original);
            }
            state.is_first_fetch = false;
            std::mem::take(&mut state.listening_to)
        };
        drop(detached);

        for record in &records {
            self.listen_to(record);
        }
        Ok(())
    }

    fn sort_and_filter(&self) {
        let (records, filter, columns, field_types) = {
            let state = self.inner.state.lock();
            (
                state.records.clone(),
                Arc::clone(&state.filter),
                state.sort_columns.clone(),
                Arc::clone(&state.field_types),
            )
        };
        let compare = comparator_from_columns(&columns, &field_types);
        let mut sorted_filtered: Vec<Record> = records.into_iter().filter(|r| filter(r)).collect();
        sorted_filtered.sort_by(|a, b| compare(a, b));
        self.inner.state.lock().sorted_filtered = sorted_filtered;
    }

    fn dispatch_update_events(&self) {
        self.emit_structural_change();
        self.inner.updated.send_modify(|generation| *generation += 1);
    }

    fn emit_structural_change(&self) {
        self.emit(RecordsetEvent::Changed);
        self.emit(RecordsetEvent::PageChanged);
        self.emit(RecordsetEvent::CountsChanged);
    }

    /// Rehydrate from the first fetch (`hard`), or reset every record to its
    /// initial values.
    pub fn reset(&self, hard: bool) {
        let original = if hard {
            self.inner.state.lock().original_data.clone()
        } else {
            None
        };
        match original {
            Some(original) => {
                if let Err(error) = self.hydrate(original) {
                    log::error!("Recordset reset failed: {error}");
                    return;
                }
                self.sort_and_filter();
                self.dispatch_update_events();
            }
            None => {
                for record in self.all_records() {
                    record.reset();
                }
            }
        }
    }

    // ── Listeners ────────────────────────────────────────────────────

    fn emit(&self, event: RecordsetEvent) {
        self.inner.emitter.emit(&event);
    }

    /// Listen to every recordset event.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RecordsetEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.subscribe(listener)
    }

    /// Listen to one kind of event.
    pub fn on<F>(&self, kind: RecordsetEventKind, listener: F) -> Subscription
    where
        F: Fn(&RecordsetEvent) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if event.kind() == kind {
                listener(event);
            }
        })
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RecordsetEvent) + Send + Sync + 'static,
    {
        self.on(RecordsetEventKind::Changed, listener)
    }

    /// Forward a record's changes as `Updated` and `CountsChanged`. Listening
    /// twice to the same record is a no-op.
    fn listen_to(&self, record: &Record) {
        if self.inner.state.lock().listening_to.contains_key(&record.id()) {
            return;
        }

        let recordset: Weak<RecordsetInner> = Arc::downgrade(&self.inner);
        let source = record.downgrade();
        let subscription = record.subscribe(move |event| {
            let RecordEvent::Change { field } = event else {
                return;
            };
            let Some(inner) = recordset.upgrade() else {
                return;
            };
            inner.emitter.emit(&RecordsetEvent::Updated {
                record: source.upgrade(),
                field: Some(field.clone()),
            });
            inner.emitter.emit(&RecordsetEvent::CountsChanged);
        });

        let replaced = self
            .inner
            .state
            .lock()
            .listening_to
            .insert(record.id(), subscription);
        drop(replaced);
    }

    fn stop_listening_to(&self, record: &Record) {
        let removed = self.inner.state.lock().listening_to.shift_remove(&record.id());
        drop(removed);
    }

    /// Detach from every record.
    pub fn remove_listeners(&self) {
        let removed = std::mem::take(&mut self.inner.state.lock().listening_to);
        drop(removed);
    }

    /// Number of records whose changes are being forwarded.
    pub fn listening_count(&self) -> usize {
        self.inner.state.lock().listening_to.len()
    }

    // ── Record edits ─────────────────────────────────────────────────

    /// Insert `record` just after position `index` in both lists. The page
    /// grows by one row until the next update.
    pub fn insert_record(&self, record: &Record, index: usize) {
        record.set_field_types(self.field_types());
        self.listen_to(record);
        {
            let mut state = self.inner.state.lock();
            let at = (index + 1).min(state.records.len());
            state.records.insert(at, record.clone());
            let at = (index + 1).min(state.sorted_filtered.len());
            state.sorted_filtered.insert(at, record.clone());
            state.total_count += 1;
            state.extra_row_count += 1;
        }
        self.emit_structural_change();
        self.emit(RecordsetEvent::RecordAdded {
            record: record.clone(),
            index,
        });
    }

    pub fn delete_record(&self, record: &Record) {
        {
            let mut state = self.inner.state.lock();
            let Some(position) = state.sorted_filtered.iter().position(|r| r == record) else {
                log::warn!("Record {} is not in the recordset", record.id());
                return;
            };
            state.sorted_filtered.remove(position);
            if let Some(position) = state.records.iter().position(|r| r == record) {
                state.records.remove(position);
            }
            state.total_count = state.total_count.saturating_sub(1);
            state.extra_row_count = state.extra_row_count.saturating_sub(1);
        }
        self.stop_listening_to(record);
        self.emit_structural_change();
    }

    /// Add a record of default values at the end of the view. Typed rows copy
    /// the first record and overwrite its declared fields.
    pub fn append_record(&self) -> Result<Record> {
        let field_types = self.field_types();
        let defaults: Map<String, Value> = field_types
            .iter()
            .map(|(name, field_type)| (name.clone(), field_type.default_value(None)))
            .collect();

        let first = self.all_records().into_iter().next();
        let (values, backing) = match first {
            Some(first) if first.backing() != Backing::Plain => {
                let mut values = first.values();
                if let Value::Object(map) = &mut values {
                    map.extend(defaults);
                }
                (values, first.backing())
            }
            _ => (Value::Object(defaults), Backing::Plain),
        };

        let record = Record::with_backing(field_types, values, backing)?;
        let index = self.filtered_record_count();
        self.insert_record(&record, index);
        Ok(record)
    }

    /// Insert a copy of `record` after `row_index`, keeping only `fields`
    /// (every declared field when `None`).
    pub fn clone_record(&self, record: &Record, row_index: usize, fields: Option<&[&str]>) -> Record {
        let copy = match fields {
            Some(fields) => record.duplicate_fields(fields),
            None => record.duplicate(),
        };
        self.insert_record(&copy, row_index);
        copy
    }

    /// Announce that `record` was edited in place.
    pub fn update_record(&self, record: &Record) {
        {
            let mut state = self.inner.state.lock();
            if let Some(position) = state.records.iter().position(|r| r == record) {
                state.records[position] = record.clone();
            }
            if let Some(position) = state.sorted_filtered.iter().position(|r| r == record) {
                state.sorted_filtered[position] = record.clone();
            }
        }
        self.emit_structural_change();
    }

    /// Set `field` on every record where it is not disabled.
    pub fn set_column_value(&self, field: &str, value: Value) {
        for record in self.all_records() {
            if !record.field_type_for_field(field).is_disabled(&record) {
                record.set_field(field, value.clone());
            }
        }
        self.emit(RecordsetEvent::Changed);
        self.emit(RecordsetEvent::PageChanged);
        self.emit(RecordsetEvent::Updated {
            record: None,
            field: Some(field.to_string()),
        });
    }

    /// An independent copy: copied field types, duplicated records, the same
    /// fetch source. The copy does not fetch until a hard update.
    pub fn duplicate(&self) -> Recordset {
        let field_types: FieldTypeMap = self
            .field_types()
            .iter()
            .map(|(name, field_type)| (name.clone(), field_type.copy()))
            .collect();
        let copy = Recordset::new(field_types, self.inner.fetch.clone())
            .with_debounce_interval(self.debounce_interval());
        copy.inner.state.lock().is_clone = true;
        copy.copy_from(self, None);
        copy
    }

    /// Append copies of every record in `other`.
    pub fn copy_from(&self, other: &Recordset, fields: Option<&[&str]>) {
        for (index, record) in other.all_records().iter().enumerate() {
            self.clone_record(record, index, fields);
        }
        let mut state = self.inner.state.lock();
        state.is_fetch_needed = false;
        state.is_first_fetch = false;
    }

    // ── Data access ──────────────────────────────────────────────────

    /// Values of the filtered and sorted records.
    pub fn get_data(&self) -> Vec<Value> {
        self.sorted_filtered_records().iter().map(Record::values).collect()
    }

    /// Replace every record with rows built from `data`, then update without
    /// fetching.
    pub fn set_data(&self, data: Vec<Value>) -> Result<()> {
        let field_types = self.field_types();
        let records = data
            .into_iter()
            .map(|values| Record::with_backing(Arc::clone(&field_types), values, Backing::Plain))
            .collect::<Result<Vec<_>>>()?;

        let detached = {
            let mut state = self.inner.state.lock();
            state.total_count = records.len();
            state.records = records.clone();
            state.is_fetch_needed = false;
            std::mem::take(&mut state.listening_to)
        };
        drop(detached);
        for record in &records {
            self.listen_to(record);
        }

        let _ = self.request_update();
        Ok(())
    }

    pub fn get_record_at_index(&self, index: usize) -> Result<Record> {
        let state = self.inner.state.lock();
        if state.records.is_empty() {
            return Err(RecordKitError::NoRecords);
        }
        state
            .records
            .get(index)
            .cloned()
            .ok_or(RecordKitError::IndexOutOfRange {
                index,
                len: state.records.len(),
            })
    }

    // ── Columns ──────────────────────────────────────────────────────

    fn view_values(&self, field: &str) -> Vec<Value> {
        self.sorted_filtered_records()
            .iter()
            .map(|record| record.get_field(field))
            .collect()
    }

    pub fn all_records_match(&self, field: &str, value: &Value) -> bool {
        self.view_values(field).iter().all(|v| v == value)
    }

    pub fn no_records_match(&self, field: &str, value: &Value) -> bool {
        self.view_values(field).iter().all(|v| v != value)
    }

    pub fn partial_records_match(&self, field: &str, value: &Value) -> bool {
        !(self.all_records_match(field, value) || self.no_records_match(field, value))
    }

    pub fn records_matching(&self, field: &str, value: &Value) -> Vec<Record> {
        self.sorted_filtered_records()
            .into_iter()
            .filter(|record| record.get_field(field) == *value)
            .collect()
    }

    pub fn count_records_matching(&self, field: &str, value: &Value) -> usize {
        self.records_matching(field, value).len()
    }

    // ── Validation ───────────────────────────────────────────────────

    pub fn add_validator(&self, validator: RecordsetValidator) {
        self.inner.state.lock().validators.push(validator);
    }

    pub fn add_validators(&self, validators: impl IntoIterator<Item = RecordsetValidator>) {
        for validator in validators {
            self.add_validator(validator);
        }
    }

    /// Names of the recordset validators that fail.
    pub fn errors(&self) -> Vec<String> {
        let (validators, records) = {
            let state = self.inner.state.lock();
            (state.validators.clone(), state.records.clone())
        };
        validators
            .into_iter()
            .filter(|validator| !(validator.validate)(&records))
            .map(|validator| validator.name)
            .collect()
    }

    /// Records that fail validation or lack a required value.
    pub fn invalid_record_count(&self) -> usize {
        self.all_records()
            .iter()
            .filter(|record| !(record.is_valid() && record.has_required_values()))
            .count()
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_record_count() == 0 && self.errors().is_empty()
    }
}
