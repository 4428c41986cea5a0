//! Caller-supplied base query.
//!
//! A table may start from an already encoded query string carrying `filter`,
//! `orderby` and `expand`. Everything else in it is ignored.

use std::str::FromStr;

use crate::{Error, Result};

/// The parts of a pre-existing query string that take part in composition.
///
/// Empty values count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreQuery {
    pub filter: Option<String>,
    pub orderby: Option<String>,
    pub expand: Option<String>,
}

#[derive(Clone, Copy)]
enum Slot {
    Filter,
    OrderBy,
    Expand,
}

impl Slot {
    fn from_key(key: &str) -> Option<(Self, bool)> {
        let (name, dollar) = match key.strip_prefix('$') {
            Some(name) => (name, true),
            None => (key, false),
        };
        let slot = match name {
            "filter" => Slot::Filter,
            "orderby" => Slot::OrderBy,
            "expand" => Slot::Expand,
            _ => return None,
        };
        Some((slot, dollar))
    }
}

impl PreQuery {
    /// Parse a URL query string, with or without the leading `?`.
    ///
    /// `+` decodes to a space. The first occurrence of a key wins, and the
    /// unprefixed form (`filter`) wins over the `$filter` form.
    ///
    /// # Errors
    /// Returns `Error::InvalidPreQuery` for malformed percent-escapes,
    /// non-UTF-8 content, or a value without a key.
    pub fn parse(raw: &str) -> Result<Self> {
        let query = raw.strip_prefix('?').unwrap_or(raw);

        let mut plain = PreQuery::default();
        let mut dollar = PreQuery::default();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key)?;
            if key.is_empty() {
                return Err(Error::InvalidPreQuery(format!(
                    "parameter without a name: `{pair}`"
                )));
            }
            let value = decode_component(raw_value)?;
            let Some((slot, is_dollar)) = Slot::from_key(&key) else {
                continue;
            };

            let target = if is_dollar { &mut dollar } else { &mut plain };
            let field = target.slot_mut(slot);
            if field.is_some() {
                tracing::warn!(key = %key, "repeated pre-query parameter, keeping the first");
                continue;
            }
            *field = Some(value);
        }

        Ok(PreQuery {
            filter: non_empty(plain.filter).or_else(|| non_empty(dollar.filter)),
            orderby: non_empty(plain.orderby).or_else(|| non_empty(dollar.orderby)),
            expand: non_empty(plain.expand).or_else(|| non_empty(dollar.expand)),
        })
    }

    /// Parse an optional pre-query; `None` and blank input give an empty one.
    ///
    /// # Errors
    /// See [`PreQuery::parse`].
    pub fn parse_opt(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("" | "?") => Ok(Self::default()),
            Some(raw) => Self::parse(raw),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<String> {
        match slot {
            Slot::Filter => &mut self.filter,
            Slot::OrderBy => &mut self.orderby,
            Slot::Expand => &mut self.expand,
        }
    }
}

impl FromStr for PreQuery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn decode_component(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while let Some(pos) = bytes[i..].iter().position(|b| *b == b'%') {
        let at = i + pos;
        let escape = bytes.get(at + 1..at + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            return Err(Error::InvalidPreQuery(format!(
                "malformed percent-escape at byte {at} in `{raw}`"
            )));
        }
        i = at + 3;
    }

    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| Error::InvalidPreQuery(format!("`{raw}` is not valid UTF-8: {e}")))
}
