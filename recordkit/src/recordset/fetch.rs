use crate::compare::SortColumn;
use crate::error::Result;
use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Query handed to a recordset's fetch function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchArgs {
    pub parameters: Value,
    pub start_index: usize,
    pub page_size: usize,
    /// One-based page number.
    pub page: usize,
    pub sort: Vec<SortColumn>,
    pub is_first_fetch: bool,
}

/// What a fetch function returns: either every row, or one page of rows plus
/// the total the server knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FetchResponse {
    #[serde(rename_all = "camelCase")]
    Page {
        data: Vec<Value>,
        total_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    All(Vec<Value>),
}

impl FetchResponse {
    pub fn page(data: Vec<Value>, total_count: usize) -> Self {
        FetchResponse::Page {
            data,
            total_count,
            summary: None,
        }
    }

    /// `(rows, total count, summary)`.
    pub fn into_parts(self) -> (Vec<Value>, usize, Option<String>) {
        match self {
            FetchResponse::All(data) => {
                let total = data.len();
                (data, total, None)
            }
            FetchResponse::Page {
                data,
                total_count,
                summary,
            } => (data, total_count, summary),
        }
    }
}

impl From<Vec<Value>> for FetchResponse {
    fn from(data: Vec<Value>) -> Self {
        FetchResponse::All(data)
    }
}

pub type FetchFuture = BoxFuture<'static, Result<FetchResponse>>;

/// A recordset's data source.
#[derive(Clone)]
pub struct Fetch(Arc<dyn Fn(FetchArgs) -> FetchFuture + Send + Sync>);

impl Fetch {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(FetchArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FetchResponse>> + Send + 'static,
    {
        Fetch(Arc::new(move |args: FetchArgs| f(args).boxed()))
    }

    /// A source that answers without suspending.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(FetchArgs) -> Result<FetchResponse> + Send + Sync + 'static,
    {
        Fetch(Arc::new(move |args: FetchArgs| future::ready(f(args)).boxed()))
    }

    /// A fixed response, returned on every call.
    pub fn data(response: impl Into<FetchResponse>) -> Self {
        let response = response.into();
        Self::sync(move |_: FetchArgs| Ok(response.clone()))
    }

    /// A source with no rows.
    pub fn empty() -> Self {
        Self::data(Vec::new())
    }

    pub(crate) fn call(&self, args: FetchArgs) -> FetchFuture {
        (self.0)(args)
    }
}

impl fmt::Debug for Fetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fetch(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_parts() {
        let all = FetchResponse::from(vec![json!({}), json!({})]);
        assert_eq!(all.into_parts().1, 2);

        let page = FetchResponse::page(vec![json!({})], 20);
        let (data, total, summary) = page.into_parts();
        assert_eq!((data.len(), total, summary), (1, 20, None));
    }

    #[test]
    fn test_response_shapes_deserialize() {
        let all: FetchResponse = serde_json::from_value(json!([{ "a": 1 }])).unwrap();
        assert_eq!(all, FetchResponse::All(vec![json!({ "a": 1 })]));

        let page: FetchResponse = serde_json::from_value(json!({
            "data": [{ "a": 1 }],
            "totalCount": 40,
            "summary": "1 of 40"
        }))
        .unwrap();
        assert_eq!(
            page,
            FetchResponse::Page {
                data: vec![json!({ "a": 1 })],
                total_count: 40,
                summary: Some("1 of 40".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_fixed_data_source() {
        let fetch = Fetch::data(vec![json!({ "name": "one" })]);
        let args = FetchArgs {
            parameters: json!({}),
            start_index: 0,
            page_size: 10,
            page: 1,
            sort: vec![],
            is_first_fetch: true,
        };
        let response = fetch.call(args).await.unwrap();
        assert_eq!(response, FetchResponse::All(vec![json!({ "name": "one" })]));
    }
}
