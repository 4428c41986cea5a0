//! Query composition
//!
//! [`QueryComposer`] owns the column index and configuration for one table and
//! turns a [`TableState`] into a [`ComposedQuery`]. The free functions
//! [`compose_query_string`] and [`compose_query_object`] build a throwaway
//! composer with the default configuration.
//!
//! # Merge rules
//!
//! - The pre-query `filter` is the left operand; the computed filter is
//!   conjoined on the right when non-empty.
//! - A manual sort always wins over the pre-query `orderby`.
//! - The pre-query `expand` passes through unchanged.
//!
//! # Example
//!
//! ```rust
//! use table_odata::{ColumnDescriptor, ValueType, compose_query_string};
//! use serde_json::json;
//!
//! let columns = vec![ColumnDescriptor::new(["age"]).with_value_type(ValueType::Digit)];
//! let params = serde_json::from_value(json!({ "current": 1, "pageSize": 10, "age": 30 })).unwrap();
//!
//! let query = compose_query_string(
//!     &columns,
//!     &params,
//!     &Default::default(),
//!     &Default::default(),
//!     Some("?filter=status eq 1"),
//! )
//! .unwrap();
//! assert_eq!(
//!     query,
//!     "?count=true&top=10&filter=status%20eq%201%20and%20age%20eq%2030"
//! );
//! ```

use serde::{Deserialize, Deserializer};

use crate::config::ComposerConfig;
use crate::filter::{FilterOp, build_filter};
use crate::paging::Paging;
use crate::prequery::PreQuery;
use crate::render::render;
use crate::schema::{ColumnDescriptor, ColumnIndex};
use crate::sort::{SortSpec, build_sort};
use crate::value::Params;
use crate::{ComposedQuery, Result};

/// Query state reported by a data table.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableState {
    /// Search form values, including the reserved `current`/`pageSize` keys.
    #[serde(deserialize_with = "null_as_default")]
    pub params: Params,
    #[serde(deserialize_with = "null_as_default")]
    pub sort: SortSpec,
    /// Quick filters set from column headers.
    #[serde(deserialize_with = "null_as_default")]
    pub filter: Params,
    /// Already encoded query string to merge with.
    pub pre_query: Option<String>,
}

impl TableState {
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Params) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_pre_query(mut self, pre_query: impl Into<String>) -> Self {
        self.pre_query = Some(pre_query.into());
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reusable composer for one table's columns.
///
/// Holds only immutable state, so it can be shared across threads.
#[derive(Clone, Debug)]
pub struct QueryComposer {
    columns: ColumnIndex,
    config: ComposerConfig,
    offset: String,
}

impl QueryComposer {
    /// Composer with the default configuration.
    #[must_use]
    pub fn new(columns: &[ColumnDescriptor]) -> Self {
        Self {
            columns: ColumnIndex::new(columns),
            config: ComposerConfig::default(),
            offset: ComposerConfig::DEFAULT_DATETIME_OFFSET.to_owned(),
        }
    }

    /// # Errors
    /// Returns `Error::InvalidConfig` if `config` fails validation.
    pub fn with_config(columns: &[ColumnDescriptor], config: ComposerConfig) -> Result<Self> {
        config.validate()?;
        let offset = config.offset_suffix()?;
        Ok(Self {
            columns: ColumnIndex::new(columns),
            config,
            offset,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    #[must_use]
    pub fn columns(&self) -> &ColumnIndex {
        &self.columns
    }

    /// Compose the query for one table state.
    ///
    /// # Errors
    /// - `Error::InvalidPagingInput` for a missing or invalid page window
    /// - `Error::InvalidParameter` for values a column cannot filter on
    /// - `Error::InvalidPreQuery` for a malformed pre-query
    pub fn compose(&self, state: &TableState) -> Result<ComposedQuery> {
        let paging = Paging::from_params(&state.params, self.config.max_page_size)?;
        let pre = PreQuery::parse_opt(state.pre_query.as_deref())?;
        let computed = build_filter(&state.params, &state.filter, &self.columns, &self.offset)?;

        let mut query = ComposedQuery::new(paging.top(), paging.skip()?);
        query.filter = merge_filter(pre.filter, computed);
        query.expand = pre.expand;

        let orderby_source = match (build_sort(&state.sort), pre.orderby) {
            (Some(manual), _) => {
                query.orderby = Some(manual);
                "sort"
            }
            (None, Some(fallback)) => {
                query.orderby = Some(fallback);
                "pre_query"
            }
            (None, None) => "none",
        };

        tracing::debug!(
            top = query.top,
            skip = query.skip,
            has_filter = query.has_filter(),
            orderby_source,
            "composed table query"
        );
        Ok(query)
    }

    /// Compose and render as `?k=v&...` with the configured parameter naming.
    ///
    /// # Errors
    /// See [`QueryComposer::compose`].
    pub fn to_query_string(&self, state: &TableState) -> Result<String> {
        let query = self.compose(state)?;
        Ok(render(&query, self.config.param_naming))
    }

    /// Compose into the structured form, the same value [`compose_query_object`]
    /// returns. Serialize it, or use [`ComposedQuery::to_pairs`] for keys in the
    /// configured naming.
    ///
    /// # Errors
    /// See [`QueryComposer::compose`].
    pub fn to_query_object(&self, state: &TableState) -> Result<ComposedQuery> {
        self.compose(state)
    }
}

fn merge_filter(pre: Option<String>, computed: Option<String>) -> Option<String> {
    match (pre, computed) {
        (Some(pre), Some(computed)) => Some(format!("{pre} {} {computed}", FilterOp::And)),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

/// Compose a table query and render it as a query string beginning with `?`.
///
/// # Errors
/// See [`QueryComposer::compose`].
pub fn compose_query_string(
    columns: &[ColumnDescriptor],
    params: &Params,
    sort: &SortSpec,
    filter: &Params,
    pre_query: Option<&str>,
) -> Result<String> {
    let query = compose_query_object(columns, params, sort, filter, pre_query)?;
    Ok(render(&query, ComposerConfig::default().param_naming))
}

/// Compose a table query into its structured form.
///
/// # Errors
/// See [`QueryComposer::compose`].
pub fn compose_query_object(
    columns: &[ColumnDescriptor],
    params: &Params,
    sort: &SortSpec,
    filter: &Params,
    pre_query: Option<&str>,
) -> Result<ComposedQuery> {
    let state = TableState {
        params: params.clone(),
        sort: sort.clone(),
        filter: filter.clone(),
        pre_query: pre_query.map(str::to_owned),
    };
    QueryComposer::new(columns).compose(&state)
}
