//! Declarative field types, observable records and paginated recordsets.
//!
//! A [`FieldType`] describes how one value is validated, formatted, parsed
//! and displayed. A [`Record`] binds a map of field types to a JSON object
//! and announces every change. A [`Recordset`] holds records behind a
//! [`Fetch`] source and keeps a sorted, filtered and paged view current.

pub mod compare;
pub mod error;
pub mod events;
pub mod field_type;
pub mod filters;
pub mod record;
pub mod recordset;
pub mod schema;
pub mod util;

pub use compare::{SortColumn, SortDirection};
pub use error::{RecordKitError, Result};
pub use events::{Emitter, Subscription};
pub use field_type::{FieldType, FieldTypeBuilder, OptionsConfig};
pub use filters::RecordFilter;
pub use record::{field_type_map, Field, FieldTypeMap, Record};
pub use recordset::{Fetch, FetchArgs, FetchResponse, Recordset, RecordsetEvent, RecordsetEventKind};
pub use schema::FieldsetDefinition;
