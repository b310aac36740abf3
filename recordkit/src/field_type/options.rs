use crate::error::{RecordKitError, Result};
use crate::record::Record;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type OptionsResult = std::result::Result<Arc<Vec<Value>>, Arc<RecordKitError>>;
pub type OptionsFuture = Shared<BoxFuture<'static, OptionsResult>>;

type RawOptions = std::result::Result<Vec<Value>, Arc<RecordKitError>>;
type SourceFn = Arc<dyn Fn(Option<Record>) -> BoxFuture<'static, RawOptions> + Send + Sync>;
type ItemFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
type OptionCompareFn = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;
type OptionFilterFn = Arc<dyn Fn(&Value, usize, Option<&Record>) -> bool + Send + Sync>;

/// How an option item yields its `text` or `value`.
#[derive(Clone)]
pub enum OptionKey {
    Key(String),
    Fn(ItemFn),
}

impl OptionKey {
    fn resolve(&self, item: &Value) -> Value {
        match self {
            OptionKey::Key(key) => match item {
                Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
                other => other.clone(),
            },
            OptionKey::Fn(f) => f(item),
        }
    }
}

impl fmt::Debug for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKey::Key(key) => write!(f, "Key({key:?})"),
            OptionKey::Fn(_) => write!(f, "Fn(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Data,
    Deferred,
    Fetch,
}

#[derive(Clone)]
struct OptionsSource {
    kind: SourceKind,
    fetch: SourceFn,
    /// Ignores the record, so one successful load serves every caller.
    is_static: bool,
}

/// Choice-list configuration accepted by the `options` builder method.
#[derive(Clone)]
pub struct OptionsConfig {
    source: OptionsSource,
    pub text: OptionKey,
    pub value: OptionKey,
    pub compare_function: Option<OptionCompareFn>,
    pub filter: Option<OptionFilterFn>,
    pub fields: Option<Vec<String>>,
    pub hide_select_all: bool,
    pub no_cache: bool,
}

impl OptionsConfig {
    fn with_source(kind: SourceKind, fetch: SourceFn, is_static: bool) -> Self {
        Self {
            source: OptionsSource {
                kind,
                fetch,
                is_static,
            },
            text: OptionKey::Key("text".to_string()),
            value: OptionKey::Key("value".to_string()),
            compare_function: None,
            filter: None,
            fields: None,
            hide_select_all: false,
            no_cache: false,
        }
    }

    /// A fixed list of items.
    pub fn data(items: Vec<Value>) -> Self {
        let items = Arc::new(items);
        Self::with_source(
            SourceKind::Data,
            Arc::new(move |_: Option<Record>| future::ready(Ok(items.as_ref().clone())).boxed()),
            true,
        )
    }

    /// Items produced once by a pending computation.
    pub fn deferred<Fut>(items: Fut) -> Self
    where
        Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
    {
        let shared = items.map(|r| r.map_err(Arc::new)).boxed().shared();
        Self::with_source(
            SourceKind::Deferred,
            Arc::new(move |_: Option<Record>| shared.clone().boxed()),
            true,
        )
    }

    /// Items looked up for a specific record. Cached per hash of `fields`.
    pub fn fetch<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<Record>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
    {
        Self::with_source(
            SourceKind::Fetch,
            Arc::new(move |record: Option<Record>| f(record).map(|r| r.map_err(Arc::new)).boxed()),
            false,
        )
    }

    /// Items looked up without regard to the record: fetched once, then cached.
    pub fn fetch_static<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
    {
        Self::with_source(
            SourceKind::Fetch,
            Arc::new(move |_: Option<Record>| f().map(|r| r.map_err(Arc::new)).boxed()),
            true,
        )
    }

    pub fn text(mut self, key: impl Into<String>) -> Self {
        self.text = OptionKey::Key(key.into());
        self
    }

    pub fn text_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.text = OptionKey::Fn(Arc::new(f));
        self
    }

    pub fn value(mut self, key: impl Into<String>) -> Self {
        self.value = OptionKey::Key(key.into());
        self
    }

    pub fn value_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.value = OptionKey::Fn(Arc::new(f));
        self
    }

    pub fn compare_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.compare_function = Some(Arc::new(f));
        self
    }

    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, usize, Option<&Record>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(f));
        self
    }

    /// Record fields whose values decide whether cached options are still good.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn hide_select_all(mut self) -> Self {
        self.hide_select_all = true;
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind
    }

    pub fn is_static(&self) -> bool {
        self.source.is_static
    }

    /// Configured keys, for field-type descriptions.
    pub(crate) fn summary(&self) -> String {
        let mut keys = vec![match self.source.kind {
            SourceKind::Data | SourceKind::Deferred => "data",
            SourceKind::Fetch => "fetch",
        }];
        if !matches!(&self.text, OptionKey::Key(k) if k == "text") {
            keys.push("text");
        }
        if !matches!(&self.value, OptionKey::Key(k) if k == "value") {
            keys.push("value");
        }
        if self.compare_function.is_some() {
            keys.push("compare_function");
        }
        if self.filter.is_some() {
            keys.push("filter");
        }
        if self.fields.is_some() {
            keys.push("fields");
        }
        if self.hide_select_all {
            keys.push("hide_select_all");
        }
        if self.no_cache {
            keys.push("no_cache");
        }
        keys.join(", ")
    }

    fn map_item(&self, item: &Value) -> Value {
        let text = self.text.resolve(item);
        let value = self.value.resolve(item);
        let mut mapped = match item {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        mapped.insert("text".to_string(), text);
        mapped.insert("value".to_string(), value);
        Value::Object(mapped)
    }

    fn shape(&self, data: Vec<Value>, record: Option<&Record>) -> Vec<Value> {
        let mut items: Vec<Value> = data.iter().map(|item| self.map_item(item)).collect();
        if let Some(compare) = &self.compare_function {
            items.sort_by(|a, b| compare(a, b));
        }
        match &self.filter {
            Some(filter) => items
                .into_iter()
                .enumerate()
                .filter(|(index, item)| filter(item, *index, record))
                .map(|(_, item)| item)
                .collect(),
            None => items,
        }
    }
}

impl From<Vec<Value>> for OptionsConfig {
    fn from(items: Vec<Value>) -> Self {
        OptionsConfig::data(items)
    }
}

impl fmt::Debug for OptionsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsConfig")
            .field("source", &self.source.kind)
            .field("text", &self.text)
            .field("value", &self.value)
            .field("fields", &self.fields)
            .field("hide_select_all", &self.hide_select_all)
            .field("no_cache", &self.no_cache)
            .finish()
    }
}

struct OptionsCache {
    hash: Option<String>,
    results: OptionsFuture,
}

/// An options config plus the result cache shared by every field type derived
/// from the one that declared it.
#[derive(Clone)]
pub struct OptionsDescriptor {
    config: Arc<OptionsConfig>,
    cache: Arc<Mutex<Option<OptionsCache>>>,
}

impl OptionsDescriptor {
    pub fn new(config: OptionsConfig) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &OptionsConfig {
        &self.config
    }

    pub fn is_cached(&self) -> bool {
        self.cache.lock().is_some()
    }

    pub(crate) fn load(
        &self,
        record: Option<&Record>,
        verbatim: bool,
        on_loaded: LoadedFn,
    ) -> OptionsFuture {
        let hash = record.map(|r| r.hash_of_fields(self.config.fields.as_deref()));

        if !self.config.no_cache {
            if let Some(cache) = self.cache.lock().as_ref() {
                if cache.hash == hash || self.config.is_static() {
                    return cache.results.clone();
                }
            }
        }

        let pending = (self.config.source.fetch)(record.cloned());
        let results = resolve(
            pending,
            Arc::clone(&self.config),
            record.cloned(),
            verbatim,
            on_loaded,
        )
        .boxed()
        .shared();

        *self.cache.lock() = Some(OptionsCache {
            hash,
            results: results.clone(),
        });
        results
    }
}

pub(crate) type LoadedFn = Box<dyn FnOnce(&[Value]) + Send>;

async fn resolve(
    pending: BoxFuture<'static, RawOptions>,
    config: Arc<OptionsConfig>,
    owner: Option<Record>,
    verbatim: bool,
    on_loaded: LoadedFn,
) -> OptionsResult {
    let data = pending.await?;
    let items = if verbatim {
        data
    } else {
        config.shape(data, owner.as_ref())
    };
    on_loaded(&items);
    Ok(Arc::new(items))
}

impl fmt::Debug for OptionsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsDescriptor")
            .field("config", &self.config)
            .field("cached", &self.is_cached())
            .finish()
    }
}
