//! Manual sort translation.
//!
//! Table widgets report sorting as `{ "<field>": "ascend" | "descend" }`
//! where nested fields are joined with commas (`"owner,name"`).

use indexmap::IndexMap;

use crate::{ODataOrderBy, OrderKey, SortDir};

/// Field path (comma-joined segments) to direction token.
pub type SortSpec = IndexMap<String, Option<String>>;

/// Separator between nested field segments in sort keys.
pub const SORT_KEY_SEPARATOR: char = ',';

const PATH_SEPARATOR_STR: &str = "/";

/// Translate a sort spec into typed order keys, preserving spec order.
pub fn to_order_by(spec: &SortSpec) -> ODataOrderBy {
    ODataOrderBy(
        spec.iter()
            .map(|(field, token)| OrderKey {
                field: field.replace(SORT_KEY_SEPARATOR, PATH_SEPARATOR_STR),
                dir: SortDir::from_token(token.as_deref()),
            })
            .collect(),
    )
}

/// Render the `$orderby` value, or `None` when nothing is sorted.
#[must_use]
pub fn build_sort(spec: &SortSpec) -> Option<String> {
    let order = to_order_by(spec);
    (!order.is_empty()).then(|| order.to_string())
}
