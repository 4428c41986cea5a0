#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Table state to `OData` query composer.
//!
//! Turns the query state of a data table (pagination, column filters,
//! quick filters, manual sort and an optional caller-supplied base query)
//! into an `OData` v4 query, either as a rendered query string or as a
//! structured [`ComposedQuery`].
//!
//! # Example
//!
//! ```rust
//! use table_odata::{ColumnDescriptor, QueryComposer, TableState, ValueType};
//! use serde_json::json;
//!
//! let columns = vec![
//!     ColumnDescriptor::new(["age"]).with_value_type(ValueType::Digit),
//!     ColumnDescriptor::new(["name"]),
//! ];
//! let composer = QueryComposer::new(&columns);
//!
//! let state: TableState = serde_json::from_value(json!({
//!     "params": { "current": 2, "pageSize": 20, "age": 30 },
//!     "sort": { "name": "descend" },
//! }))
//! .unwrap();
//!
//! let query = composer.compose(&state).unwrap();
//! assert_eq!(query.top, 20);
//! assert_eq!(query.skip, 20);
//! assert_eq!(query.filter.as_deref(), Some("age eq 30"));
//! assert_eq!(query.orderby.as_deref(), Some("name desc"));
//! ```
pub mod builder;
pub mod config;
pub mod filter;
pub mod paging;
pub mod prequery;
pub mod render;
pub mod schema;
pub mod sort;
pub mod value;

pub use builder::{QueryComposer, TableState, compose_query_object, compose_query_string};
pub use config::{ComposerConfig, ParamNaming};
pub use paging::Paging;
pub use prequery::PreQuery;
pub use render::strip_export_params;
pub use schema::{ColumnDescriptor, ColumnIndex, ValueType};
pub use sort::SortSpec;
pub use value::{ParamValue, Params, Scalar};

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    /// Token used by table widgets to request a descending sort.
    pub const DESCEND_TOKEN: &'static str = "descend";

    /// Map a table widget direction token; anything but `descend` sorts ascending.
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some(Self::DESCEND_TOKEN) => SortDir::Desc,
            _ => SortDir::Asc,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ODataOrderBy(pub Vec<OrderKey>);

impl ODataOrderBy {
    pub fn empty() -> Self {
        Self(vec![])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders the `$orderby` wire form: `a/b desc,c asc`.
impl std::fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{} {}", key.field, key.dir.as_str())?;
        }
        Ok(())
    }
}

/// Unified error type for query composition.
///
/// Unmatched columns and empty filter values are not errors: the former fall
/// back to a substring clause, the latter produce no clause at all.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid paging input: {0}")]
    InvalidPagingInput(String),

    #[error("invalid pre-query: {0}")]
    InvalidPreQuery(String),

    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The composed query, single source of truth for both output forms.
///
/// Field order matches the rendered parameter order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ComposedQuery {
    pub count: bool,
    pub top: u64,
    pub skip: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
}

impl ComposedQuery {
    /// A counted query window with no filter, expansion or ordering.
    #[must_use]
    pub fn new(top: u64, skip: u64) -> Self {
        Self {
            count: true,
            top,
            skip,
            filter: None,
            expand: None,
            orderby: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: String) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_expand(mut self, expand: String) -> Self {
        self.expand = Some(expand);
        self
    }

    #[must_use]
    pub fn with_orderby(mut self, orderby: String) -> Self {
        self.orderby = Some(orderby);
        self
    }

    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.as_deref().is_some_and(|f| !f.is_empty())
    }

    /// Ordered `(key, value)` pairs that make it onto the wire.
    ///
    /// Falsy values (`false`, `0`, empty strings, absent fields) are left
    /// out, so the first page carries no `skip`.
    #[must_use]
    pub fn to_pairs(&self, naming: ParamNaming) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(6);
        if self.count {
            pairs.push((naming.key("count"), "true".to_owned()));
        }
        if self.top > 0 {
            pairs.push((naming.key("top"), self.top.to_string()));
        }
        if self.skip > 0 {
            pairs.push((naming.key("skip"), self.skip.to_string()));
        }
        let text = [
            ("filter", &self.filter),
            ("expand", &self.expand),
            ("orderby", &self.orderby),
        ];
        for (name, value) in text {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((naming.key(name), v.to_owned()));
            }
        }
        pairs
    }
}

impl std::fmt::Display for ComposedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&render::render(self, ParamNaming::Plain))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_sort_dir_from_token() {
        assert_eq!(SortDir::from_token(Some("descend")), SortDir::Desc);
        assert_eq!(SortDir::from_token(Some("ascend")), SortDir::Asc);
        assert_eq!(SortDir::from_token(Some("DESCEND")), SortDir::Asc);
        assert_eq!(SortDir::from_token(None), SortDir::Asc);
    }

    #[test]
    fn test_orderby_display() {
        let order = ODataOrderBy(vec![
            OrderKey {
                field: "a/b".to_owned(),
                dir: SortDir::Desc,
            },
            OrderKey {
                field: "c".to_owned(),
                dir: SortDir::Asc,
            },
        ]);
        assert_eq!(order.to_string(), "a/b desc,c asc");
        assert_eq!(ODataOrderBy::empty().to_string(), "");
    }

    #[test]
    fn test_pairs_skip_falsy_values() {
        let query = ComposedQuery::new(10, 0).with_filter(String::new());
        let pairs = query.to_pairs(ParamNaming::Plain);
        assert_eq!(
            pairs,
            vec![
                ("count".to_owned(), "true".to_owned()),
                ("top".to_owned(), "10".to_owned()),
            ]
        );
        assert!(!query.has_filter());
    }

    #[test]
    fn test_pairs_order_and_dollar_naming() {
        let query = ComposedQuery::new(5, 10)
            .with_orderby("name asc".to_owned())
            .with_expand("owner".to_owned())
            .with_filter("age eq 1".to_owned());
        let keys: Vec<String> = query
            .to_pairs(ParamNaming::Dollar)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            ["$count", "$top", "$skip", "$filter", "$expand", "$orderby"]
        );
    }

    #[test]
    fn test_object_form_omits_absent_fields() {
        let query = ComposedQuery::new(10, 20).with_filter("age eq 30".to_owned());
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "count": true, "top": 10, "skip": 20, "filter": "age eq 30" })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = Error::parameter("created", "expected a range");
        assert_eq!(err.to_string(), "invalid parameter `created`: expected a range");
        assert_eq!(
            Error::InvalidPagingInput("missing `pageSize`".to_owned()).to_string(),
            "invalid paging input: missing `pageSize`"
        );
    }
}
