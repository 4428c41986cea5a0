//! Parameter values coming from table forms and quick filters.
//!
//! Form inputs arrive as loosely shaped JSON. They are converted once into
//! the tree-shaped [`ParamValue`] so flattening is a total recursive walk and
//! cycles cannot be expressed.

use std::borrow::Cow;
use std::fmt;
use std::num::FpCategory;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Ordered mapping of parameter name to value, as supplied by the table.
pub type Params = IndexMap<String, ParamValue>;

/// Flattened parameters: `/`-joined field path to leaf value.
pub type FlatParams = IndexMap<String, Leaf>;

/// Separator used between nested parameter keys.
pub const PATH_SEPARATOR: char = '/';

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Scalar {
    /// Whether this value means "no filter" (`null`, `false`, `0`, `""`).
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match self {
            Scalar::Null | Scalar::Bool(false) => true,
            Scalar::Bool(true) => false,
            Scalar::Number(n) => n
                .as_f64()
                .is_some_and(|f| matches!(f.classify(), FpCategory::Zero | FpCategory::Nan)),
            Scalar::String(s) => s.is_empty(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

/// `null` renders as an empty string, the way a template literal joins array holes.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Scalar::Number(n.into())
    }
}

/// A table parameter value.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum ParamValue {
    Scalar(Scalar),
    /// Two-element `[lo, hi]` pair, e.g. from a date range picker.
    Range(Scalar, Scalar),
    Nested(Params),
}

impl ParamValue {
    pub fn range(lo: impl Into<Scalar>, hi: impl Into<Scalar>) -> Self {
        ParamValue::Range(lo.into(), hi.into())
    }

    /// Convert a JSON value, naming `field` in any error.
    ///
    /// # Errors
    /// Returns `Error::InvalidParameter` for arrays that are neither empty nor
    /// a pair of scalars.
    pub fn from_json(field: &str, value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(ParamValue::Scalar(Scalar::Null)),
            JsonValue::Bool(b) => Ok(ParamValue::Scalar(Scalar::Bool(b))),
            JsonValue::Number(n) => Ok(ParamValue::Scalar(Scalar::Number(n))),
            JsonValue::String(s) => Ok(ParamValue::Scalar(Scalar::String(s))),
            JsonValue::Array(items) => range_from_json(field, items),
            JsonValue::Object(map) => {
                let mut nested = Params::with_capacity(map.len());
                for (key, child) in map {
                    let path = join_path(field, &key);
                    let child = ParamValue::from_json(&path, child)?;
                    nested.insert(key, child);
                }
                Ok(ParamValue::Nested(nested))
            }
        }
    }
}

fn range_from_json(field: &str, items: Vec<JsonValue>) -> Result<ParamValue> {
    if items.is_empty() {
        // A cleared range picker.
        return Ok(ParamValue::Scalar(Scalar::Null));
    }
    let len = items.len();
    let mut bounds = items.into_iter().map(|item| match item {
        JsonValue::Null => Ok(Scalar::Null),
        JsonValue::Bool(b) => Ok(Scalar::Bool(b)),
        JsonValue::Number(n) => Ok(Scalar::Number(n)),
        JsonValue::String(s) => Ok(Scalar::String(s)),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(Error::parameter(
            field,
            "range bounds must be scalar values",
        )),
    });
    match (bounds.next(), bounds.next(), len) {
        (Some(lo), Some(hi), 2) => Ok(ParamValue::Range(lo?, hi?)),
        _ => Err(Error::parameter(
            field,
            format!("expected a two-element range, got {len} elements"),
        )),
    }
}

impl TryFrom<JsonValue> for ParamValue {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self> {
        ParamValue::from_json("", value)
    }
}

/// Convert a JSON object into [`Params`]; `null` yields empty parameters.
///
/// # Errors
/// Returns `Error::InvalidParameter` naming the offending key, or when the
/// value is not an object.
pub fn params_from_json(value: JsonValue) -> Result<Params> {
    match ParamValue::from_json("", value)? {
        ParamValue::Nested(params) => Ok(params),
        ParamValue::Scalar(Scalar::Null) => Ok(Params::new()),
        ParamValue::Scalar(_) | ParamValue::Range(..) => {
            Err(Error::parameter("<root>", "expected an object"))
        }
    }
}

impl From<Scalar> for ParamValue {
    fn from(s: Scalar) -> Self {
        ParamValue::Scalar(s)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Scalar(s.into())
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Scalar(n.into())
    }
}

/// A flattened parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum Leaf {
    Scalar(Scalar),
    Range(Scalar, Scalar),
}

impl Leaf {
    /// Scalars follow [`Scalar::is_falsy`]; a range is falsy when both bounds are.
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match self {
            Leaf::Scalar(s) => s.is_falsy(),
            Leaf::Range(lo, hi) => lo.is_falsy() && hi.is_falsy(),
        }
    }
}

/// Ranges render as `lo,hi`.
impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Scalar(s) => write!(f, "{s}"),
            Leaf::Range(lo, hi) => write!(f, "{lo},{hi}"),
        }
    }
}

/// Flatten nested parameters into `/`-joined paths, one entry per leaf.
///
/// Ranges are leaves. A later entry with the same flattened path replaces
/// the value of the earlier one but keeps its position.
#[must_use]
pub fn flatten(params: &Params) -> FlatParams {
    let mut out = FlatParams::with_capacity(params.len());
    flatten_into(params.iter(), "", &mut out);
    out
}

pub(crate) fn flatten_into<'a, I>(entries: I, parent: &str, out: &mut FlatParams)
where
    I: IntoIterator<Item = (&'a String, &'a ParamValue)>,
{
    for (key, value) in entries {
        let path = join_path(parent, key);
        match value {
            ParamValue::Scalar(s) => {
                out.insert(path, Leaf::Scalar(s.clone()));
            }
            ParamValue::Range(lo, hi) => {
                out.insert(path, Leaf::Range(lo.clone(), hi.clone()));
            }
            ParamValue::Nested(children) => flatten_into(children.iter(), &path, out),
        }
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}{PATH_SEPARATOR}{key}")
    }
}

/// Escape text for an `OData` string literal by doubling single quotes.
#[must_use]
pub fn escape_literal(text: &str) -> Cow<'_, str> {
    if text.contains('\'') {
        Cow::Owned(text.replace('\'', "''"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Escape a scalar; only strings change.
#[must_use]
pub fn escape_scalar(value: &Scalar) -> Scalar {
    match value {
        Scalar::String(s) => Scalar::String(escape_literal(s).into_owned()),
        other => other.clone(),
    }
}
