//! Filter clause selection.
//!
//! Each flattened form or quick-filter value becomes at most one clause,
//! chosen by the column's value type, and the clauses are joined with `and`.

use std::fmt;

use crate::paging::is_reserved;
use crate::schema::{ColumnIndex, ValueType};
use crate::value::{FlatParams, Leaf, Params, Scalar, escape_literal, flatten, flatten_into};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ge,
    Le,
    Contains,
    And,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Eq => write!(f, "eq"),
            FilterOp::Ge => write!(f, "ge"),
            FilterOp::Le => write!(f, "le"),
            FilterOp::Contains => write!(f, "contains"),
            FilterOp::And => write!(f, "and"),
        }
    }
}

/// A single filter clause for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `<path> <op> <operand>`; the operand is already escaped.
    Compare {
        path: String,
        op: FilterOp,
        operand: String,
    },
    /// `<path> ge <lower> and <path> le <upper>`, either side optional.
    Between {
        path: String,
        lower: Option<String>,
        upper: Option<String>,
    },
    /// `contains(<path>,'<needle>')`; `spaced` adds a space after the comma.
    Contains {
        path: String,
        needle: String,
        spaced: bool,
    },
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Compare { path, op, operand } => write!(f, "{path} {op} {operand}"),
            Clause::Between { path, lower, upper } => match (lower, upper) {
                (Some(lo), Some(hi)) => write!(
                    f,
                    "{path} {} {lo} {} {path} {} {hi}",
                    FilterOp::Ge,
                    FilterOp::And,
                    FilterOp::Le
                ),
                (Some(lo), None) => write!(f, "{path} {} {lo}", FilterOp::Ge),
                (None, Some(hi)) => write!(f, "{path} {} {hi}", FilterOp::Le),
                (None, None) => Ok(()),
            },
            Clause::Contains {
                path,
                needle,
                spaced,
            } => {
                let sep = if *spaced { ", " } else { "," };
                write!(f, "{}({path}{sep}'{needle}')", FilterOp::Contains)
            }
        }
    }
}

/// Pick the clause for one flattened `(path, value)` pair.
///
/// Falsy values yield `None`: filtering on a literal `0` or `""` is not
/// possible through this path. Unknown or untyped columns fall back to a
/// substring match.
///
/// # Errors
/// Returns `Error::InvalidParameter` when a `dateRange` column receives a
/// single value instead of a `[lo, hi]` pair.
pub fn select_clause(
    path: &str,
    value: &Leaf,
    columns: &ColumnIndex,
    offset_suffix: &str,
) -> Result<Option<Clause>> {
    if value.is_falsy() {
        return Ok(None);
    }

    let Some(value_type) = columns.value_type(path) else {
        tracing::trace!(field = path, "no typed column, using substring match");
        return Ok(Some(contains(path, value, false)));
    };

    let clause = match value_type {
        ValueType::Digit | ValueType::Select | ValueType::Date | ValueType::DateYear => {
            compare(path, FilterOp::Eq, literal(value))
        }
        ValueType::DateTime => {
            // Whole-second equality; stored timestamps with sub-second
            // precision will not match.
            let text = value.to_string();
            let iso = text.replacen(' ', "T", 1);
            compare(
                path,
                FilterOp::Eq,
                format!("{}{offset_suffix}", escape_literal(&iso)),
            )
        }
        ValueType::DateRange => match value {
            Leaf::Range(lo, hi) => Clause::Between {
                path: path.to_owned(),
                lower: bound(lo),
                upper: bound(hi),
            },
            Leaf::Scalar(_) => {
                return Err(Error::parameter(
                    path,
                    "dateRange columns expect a [start, end] pair",
                ));
            }
        },
        ValueType::Text | ValueType::Other(_) => contains(path, value, true),
    };
    tracing::trace!(field = path, value_type = %value_type, clause = %clause, "selected clause");
    Ok(Some(clause))
}

fn compare(path: &str, op: FilterOp, operand: String) -> Clause {
    Clause::Compare {
        path: path.to_owned(),
        op,
        operand,
    }
}

fn contains(path: &str, value: &Leaf, spaced: bool) -> Clause {
    Clause::Contains {
        path: path.to_owned(),
        needle: literal(value),
        spaced,
    }
}

fn literal(value: &Leaf) -> String {
    escape_literal(&value.to_string()).into_owned()
}

fn bound(value: &Scalar) -> Option<String> {
    (!value.is_falsy()).then(|| escape_literal(&value.to_string()).into_owned())
}

/// Build the `$filter` conjunction from form and quick-filter parameters.
///
/// Top-level `current`/`pageSize` form keys are skipped. Form clauses come
/// first, then quick-filter clauses, each in flattened order. Returns `None`
/// when no clause survives.
///
/// # Errors
/// Propagates errors from [`select_clause`].
pub fn build_filter(
    form: &Params,
    quick: &Params,
    columns: &ColumnIndex,
    offset_suffix: &str,
) -> Result<Option<String>> {
    let mut form_flat = FlatParams::with_capacity(form.len());
    flatten_into(
        form.iter().filter(|(key, _)| !is_reserved(key)),
        "",
        &mut form_flat,
    );
    let quick_flat = flatten(quick);

    let mut clauses = Vec::with_capacity(form_flat.len() + quick_flat.len());
    for (path, value) in form_flat.iter().chain(quick_flat.iter()) {
        if let Some(clause) = select_clause(path, value, columns, offset_suffix)? {
            clauses.push(clause.to_string());
        }
    }

    if clauses.is_empty() {
        return Ok(None);
    }
    Ok(Some(clauses.join(&format!(" {} ", FilterOp::And))))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::schema::ColumnDescriptor;
    use serde_json::json;

    const OFFSET: &str = "+08:00";

    fn columns() -> ColumnIndex {
        ColumnIndex::new(&[
            ColumnDescriptor::new(["age"]).with_value_type(ValueType::Digit),
            ColumnDescriptor::new(["status"]).with_value_type(ValueType::Select),
            ColumnDescriptor::new(["birthday"]).with_value_type(ValueType::Date),
            ColumnDescriptor::new(["year"]).with_value_type(ValueType::DateYear),
            ColumnDescriptor::new(["created"]).with_value_type(ValueType::DateRange),
            ColumnDescriptor::new(["updated"]).with_value_type(ValueType::DateTime),
            ColumnDescriptor::new(["title"]).with_value_type(ValueType::Text),
            ColumnDescriptor::new(["price"]).with_value_type(ValueType::Other("money".into())),
            ColumnDescriptor::new(["owner", "city"]).with_value_type(ValueType::Select),
            ColumnDescriptor::new(["name"]),
        ])
    }

    fn clause(path: &str, value: Leaf) -> Option<String> {
        select_clause(path, &value, &columns(), OFFSET)
            .unwrap()
            .map(|c| c.to_string())
    }

    fn scalar(value: impl Into<Scalar>) -> Leaf {
        Leaf::Scalar(value.into())
    }

    fn params(value: serde_json::Value) -> Params {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_equality_types() {
        assert_eq!(clause("age", scalar(30_i64)).as_deref(), Some("age eq 30"));
        assert_eq!(
            clause("status", scalar("active")).as_deref(),
            Some("status eq active")
        );
        assert_eq!(
            clause("birthday", scalar("2024-01-01")).as_deref(),
            Some("birthday eq 2024-01-01")
        );
        assert_eq!(clause("year", scalar("2024")).as_deref(), Some("year eq 2024"));
        assert_eq!(
            clause("owner/city", scalar("Paris")).as_deref(),
            Some("owner/city eq Paris")
        );
    }

    #[test]
    fn test_equality_escapes_quotes() {
        assert_eq!(
            clause("status", scalar("o'k")).as_deref(),
            Some("status eq o''k")
        );
    }

    #[test]
    fn test_untyped_and_unknown_columns_use_compact_contains() {
        assert_eq!(
            clause("name", scalar("Jo'e")).as_deref(),
            Some("contains(name,'Jo''e')")
        );
        assert_eq!(
            clause("nickname", scalar("x")).as_deref(),
            Some("contains(nickname,'x')")
        );
    }

    #[test]
    fn test_text_and_other_types_use_spaced_contains() {
        assert_eq!(
            clause("title", scalar("rust")).as_deref(),
            Some("contains(title, 'rust')")
        );
        assert_eq!(
            clause("price", scalar(12_i64)).as_deref(),
            Some("contains(price, '12')")
        );
    }

    #[test]
    fn test_date_time_gets_iso_form_and_offset() {
        assert_eq!(
            clause("updated", scalar("2024-03-01 12:30:00")).as_deref(),
            Some("updated eq 2024-03-01T12:30:00+08:00")
        );
        let c = select_clause(
            "updated",
            &scalar("2024-03-01 12:30:00"),
            &columns(),
            "-05:00",
        )
        .unwrap()
        .unwrap();
        assert_eq!(c.to_string(), "updated eq 2024-03-01T12:30:00-05:00");
    }

    #[test]
    fn test_date_range() {
        assert_eq!(
            clause("created", Leaf::Range("2024-01-01".into(), "2024-01-31".into())).as_deref(),
            Some("created ge 2024-01-01 and created le 2024-01-31")
        );
    }

    #[test]
    fn test_date_range_open_bounds() {
        assert_eq!(
            clause("created", Leaf::Range("2024-01-01".into(), Scalar::Null)).as_deref(),
            Some("created ge 2024-01-01")
        );
        assert_eq!(
            clause("created", Leaf::Range("".into(), "2024-01-31".into())).as_deref(),
            Some("created le 2024-01-31")
        );
        assert_eq!(clause("created", Leaf::Range(Scalar::Null, Scalar::Null)), None);
    }

    #[test]
    fn test_date_range_rejects_single_value() {
        let err = select_clause("created", &scalar("2024-01-01"), &columns(), OFFSET).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { ref field, .. } if field == "created"));
    }

    #[test]
    fn test_range_on_non_range_column_joins_bounds() {
        assert_eq!(
            clause("name", Leaf::Range("a".into(), "b".into())).as_deref(),
            Some("contains(name,'a,b')")
        );
    }

    #[test]
    fn test_falsy_values_produce_no_clause() {
        for value in [
            scalar(0_i64),
            scalar(""),
            Leaf::Scalar(Scalar::Null),
            scalar(false),
        ] {
            assert_eq!(clause("age", value.clone()), None);
            assert_eq!(clause("name", value), None);
        }
    }

    #[test]
    fn test_build_filter_orders_form_before_quick_filters() {
        let form = params(json!({
            "current": 1,
            "pageSize": 10,
            "name": "jo",
            "owner": { "city": "Paris" },
            "age": 0,
        }));
        let quick = params(json!({ "status": "active", "age": 30 }));
        let filter = build_filter(&form, &quick, &columns(), OFFSET).unwrap();
        assert_eq!(
            filter.as_deref(),
            Some("contains(name,'jo') and owner/city eq Paris and status eq active and age eq 30")
        );
    }

    #[test]
    fn test_build_filter_never_emits_paging_keys() {
        let form = params(json!({ "current": 4, "pageSize": 50 }));
        assert_eq!(
            build_filter(&form, &Params::new(), &columns(), OFFSET).unwrap(),
            None
        );
    }

    #[test]
    fn test_build_filter_keeps_nested_reserved_names() {
        let form = params(json!({ "current": 1, "pageSize": 10, "meta": { "current": "yes" } }));
        assert_eq!(
            build_filter(&form, &Params::new(), &columns(), OFFSET)
                .unwrap()
                .as_deref(),
            Some("contains(meta/current,'yes')")
        );
    }

    #[test]
    fn test_build_filter_is_well_formed_conjunction() {
        let form = params(json!({
            "current": 1,
            "pageSize": 10,
            "name": "",
            "age": 31,
            "created": ["2024-01-01", "2024-02-01"],
            "title": null,
        }));
        let quick = params(json!({ "status": "", "year": "2023" }));
        let filter = build_filter(&form, &quick, &columns(), OFFSET)
            .unwrap()
            .unwrap();
        assert!(filter.split(" and ").all(|c| !c.trim().is_empty()));
        assert_eq!(
            filter,
            "age eq 31 and created ge 2024-01-01 and created le 2024-02-01 and year eq 2023"
        );
    }
}
