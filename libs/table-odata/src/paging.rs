//! Paging window extraction.
//!
//! Table forms carry the page window in two reserved keys, `current`
//! (1-based page number) and `pageSize`. They are validated here and never
//! reach the filter.

use crate::value::{ParamValue, Params, Scalar};
use crate::{Error, Result};

/// Reserved key holding the 1-based page number.
pub const CURRENT_KEY: &str = "current";
/// Reserved key holding the page size.
pub const PAGE_SIZE_KEY: &str = "pageSize";

/// Whether a top-level form key is reserved for paging.
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    key == CURRENT_KEY || key == PAGE_SIZE_KEY
}

/// A validated page window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paging {
    /// 1-based page number
    pub current: u64,
    pub page_size: u64,
}

impl Paging {
    /// # Errors
    /// Returns `Error::InvalidPagingInput` when either value is zero.
    pub fn new(current: u64, page_size: u64) -> Result<Self> {
        if current == 0 {
            return Err(Error::InvalidPagingInput(format!(
                "`{CURRENT_KEY}` must be at least 1"
            )));
        }
        if page_size == 0 {
            return Err(Error::InvalidPagingInput(format!(
                "`{PAGE_SIZE_KEY}` must be at least 1"
            )));
        }
        Ok(Self { current, page_size })
    }

    /// Read the reserved keys from form parameters.
    ///
    /// Values may be integers or integer strings, since form widgets send both.
    ///
    /// # Errors
    /// Returns `Error::InvalidPagingInput` if a key is missing, not a
    /// non-negative integer, zero, or the page size exceeds `max_page_size`.
    pub fn from_params(params: &Params, max_page_size: u64) -> Result<Self> {
        let current = read_integer(params, CURRENT_KEY)?;
        let page_size = read_integer(params, PAGE_SIZE_KEY)?;
        let paging = Self::new(current, page_size)?;
        if paging.page_size > max_page_size {
            return Err(Error::InvalidPagingInput(format!(
                "`{PAGE_SIZE_KEY}` {page_size} exceeds the maximum of {max_page_size}"
            )));
        }
        Ok(paging)
    }

    #[must_use]
    pub fn top(&self) -> u64 {
        self.page_size
    }

    /// Rows before this page: `(current - 1) * page_size`.
    ///
    /// # Errors
    /// Returns `Error::InvalidPagingInput` if the offset does not fit in `u64`.
    pub fn skip(&self) -> Result<u64> {
        self.current
            .saturating_sub(1)
            .checked_mul(self.page_size)
            .ok_or_else(|| {
                Error::InvalidPagingInput(format!(
                    "page {} of size {} overflows the row offset",
                    self.current, self.page_size
                ))
            })
    }
}

fn read_integer(params: &Params, key: &str) -> Result<u64> {
    let invalid = |detail: &str| Error::InvalidPagingInput(format!("`{key}` {detail}"));

    match params.get(key) {
        None | Some(ParamValue::Scalar(Scalar::Null)) => Err(invalid("is missing")),
        Some(ParamValue::Scalar(Scalar::Number(n))) => n
            .as_u64()
            .ok_or_else(|| invalid(&format!("must be a non-negative integer, got {n}"))),
        Some(ParamValue::Scalar(Scalar::String(s))) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(&format!("must be a non-negative integer, got `{s}`"))),
        Some(_) => Err(invalid("must be a number")),
    }
}
