//! Table column schema.
//!
//! This module defines what the composer knows about table columns:
//! - `ValueType`: the declared kind of a column, which selects the filter operator
//! - `ColumnDescriptor`: a column's field path plus its optional value type
//! - `ColumnIndex`: descriptors keyed by their `/`-joined path for direct lookup
//!
//! Descriptors deserialize from the table widget's column JSON, where the
//! field path is `dataIndex` (a string or an array of segments) and the kind
//! is `valueType`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::value::PATH_SEPARATOR;

/// Declared value type of a table column.
///
/// Unknown type names are kept as [`ValueType::Other`] and filter like text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Digit,
    Select,
    Date,
    DateTime,
    DateYear,
    DateRange,
    Text,
    Other(String),
}

impl ValueType {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "digit" => ValueType::Digit,
            "select" => ValueType::Select,
            "date" => ValueType::Date,
            "dateTime" => ValueType::DateTime,
            "dateYear" => ValueType::DateYear,
            "dateRange" => ValueType::DateRange,
            "text" => ValueType::Text,
            other => ValueType::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ValueType::Digit => "digit",
            ValueType::Select => "select",
            ValueType::Date => "date",
            ValueType::DateTime => "dateTime",
            ValueType::DateYear => "dateYear",
            ValueType::DateRange => "dateRange",
            ValueType::Text => "text",
            ValueType::Other(name) => name,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ValueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ValueType::parse(&name))
    }
}

/// A rendered table column, as far as filtering is concerned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(
        rename = "dataIndex",
        alias = "fieldPath",
        default,
        deserialize_with = "de_field_path"
    )]
    pub field_path: Vec<String>,
    #[serde(
        rename = "valueType",
        default,
        deserialize_with = "de_value_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub value_type: Option<ValueType>,
}

impl ColumnDescriptor {
    /// Create an untyped column from its path segments.
    ///
    /// # Example
    ///
    /// ```rust
    /// use table_odata::{ColumnDescriptor, ValueType};
    ///
    /// let city = ColumnDescriptor::new(["owner", "city"]);
    /// assert_eq!(city.path(), "owner/city");
    ///
    /// let age = ColumnDescriptor::new(["age"]).with_value_type(ValueType::Digit);
    /// assert_eq!(age.value_type, Some(ValueType::Digit));
    /// ```
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_path: segments.into_iter().map(Into::into).collect(),
            value_type: None,
        }
    }

    #[must_use]
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// The canonical `/`-joined field path.
    #[must_use]
    pub fn path(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.field_path.iter().enumerate() {
            if i > 0 {
                out.push(PATH_SEPARATOR);
            }
            out.push_str(segment);
        }
        out
    }
}

fn de_field_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match Wire::deserialize(deserializer)? {
        Wire::One(segment) => vec![segment],
        Wire::Many(segments) => segments,
        Wire::Null(()) => Vec::new(),
    })
}

fn de_value_type<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ValueType>, D::Error> {
    // An empty type name counts as no type at all.
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.filter(|n| !n.is_empty()).map(|n| ValueType::parse(&n)))
}

/// Column descriptors keyed by canonical path.
///
/// When several columns share a path the first one wins.
#[derive(Clone, Debug, Default)]
pub struct ColumnIndex {
    by_path: HashMap<String, ColumnDescriptor>,
}

impl ColumnIndex {
    #[must_use]
    pub fn new(columns: &[ColumnDescriptor]) -> Self {
        let mut by_path = HashMap::with_capacity(columns.len());
        for column in columns {
            if column.field_path.is_empty() {
                continue;
            }
            by_path.entry(column.path()).or_insert_with(|| column.clone());
        }
        Self { by_path }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ColumnDescriptor> {
        self.by_path.get(path)
    }

    /// Declared value type for `path`, if the column exists and declares one.
    #[must_use]
    pub fn value_type(&self, path: &str) -> Option<&ValueType> {
        self.get(path).and_then(|c| c.value_type.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

impl FromIterator<ColumnDescriptor> for ColumnIndex {
    fn from_iter<T: IntoIterator<Item = ColumnDescriptor>>(iter: T) -> Self {
        let columns: Vec<ColumnDescriptor> = iter.into_iter().collect();
        Self::new(&columns)
    }
}
