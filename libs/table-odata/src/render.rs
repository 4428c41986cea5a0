//! Query string rendering.

use crate::{ComposedQuery, ParamNaming};

/// Paging parameters that export links must not carry.
const PAGING_PARAMS: [&str; 3] = ["count", "top", "skip"];

/// Escapes `urlencoding` emits for characters `encodeURIComponent` keeps.
const KEPT_MARKS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Render a composed query as `?k=v&...`, percent-encoding keys and values.
///
/// Falsy fields are omitted (see [`ComposedQuery::to_pairs`]). The marks
/// `!'()*` stay literal, matching what browser clients send.
#[must_use]
pub fn render(query: &ComposedQuery, naming: ParamNaming) -> String {
    let mut out = String::from("?");
    for (i, (key, value)) in query.to_pairs(naming).iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(&encode_component(key));
        out.push('=');
        out.push_str(&encode_component(value));
    }
    out
}

/// Remove `count`, `top` and `skip` (plain or `$`-prefixed) from a URL.
///
/// Used for export and download links, which must not be limited to the
/// table's current page. Other parameters keep their order and encoding; a
/// fragment is preserved. Input without `?` is treated as a bare query
/// string.
///
/// ```rust
/// use table_odata::strip_export_params;
///
/// assert_eq!(
///     strip_export_params("?top=10&skip=0&filter=x eq 1"),
///     "?filter=x eq 1"
/// );
/// assert_eq!(strip_export_params("/api/users?count=true&top=10"), "/api/users");
/// ```
#[must_use]
pub fn strip_export_params(url: &str) -> String {
    let (url, fragment) = match url.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (url, None),
    };
    let (base, query, had_mark) = match url.split_once('?') {
        Some((base, query)) => (base, query, true),
        None => ("", url, false),
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !is_paging_pair(pair))
        .collect();

    let mut out = String::with_capacity(url.len());
    out.push_str(base);
    if !kept.is_empty() {
        if had_mark {
            out.push('?');
        }
        out.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn encode_component(text: &str) -> String {
    let mut encoded = urlencoding::encode(text).into_owned();
    for (escape, mark) in KEPT_MARKS {
        if encoded.contains(escape) {
            encoded = encoded.replace(escape, mark);
        }
    }
    encoded
}

// Keys are compared decoded, so `%24top` matches like `$top`.
fn is_paging_pair(pair: &str) -> bool {
    let Some((raw_key, _)) = pair.split_once('=') else {
        return false;
    };
    let Ok(key) = urlencoding::decode(raw_key) else {
        return false;
    };
    let key = key.strip_prefix('$').unwrap_or(key.as_ref());
    PAGING_PARAMS.contains(&key)
}
