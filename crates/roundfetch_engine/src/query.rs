//! Query-string helpers for building request URLs.

use std::fmt::Write;

/// Bytes percent-encoded in addition to C0 controls, space and non-ASCII:
/// `"`, `#`, `<`, `>` (the WHATWG query percent-encode set).
const QUERY_ENCODE_SET: &[u8] = b"\"#<>";

/// Percent-encodes `value` for use as a query name or value.
pub fn encode_query_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for &byte in value.as_bytes() {
        if !(0x21..=0x7E).contains(&byte) || QUERY_ENCODE_SET.contains(&byte) {
            let _ = write!(encoded, "%{byte:02x}");
        } else {
            encoded.push(char::from(byte));
        }
    }
    encoded
}

/// Builds `path?name=value&...` with every name and value encoded, in the given order.
pub fn build_query<K, V>(path: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let query = params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                encode_query_component(name.as_ref()),
                encode_query_component(value.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

/// URLs of pages `2..=N` of a paginated listing, where `N = ceil(overall / per_page)`.
///
/// Empty when the first page already holds everything or `per_page` is zero.
pub fn page_urls(url: &str, overall: usize, per_page: usize) -> Vec<String> {
    if per_page == 0 || per_page >= overall {
        return Vec::new();
    }
    let pages = overall.div_ceil(per_page);
    let separator = if url.contains('?') { '&' } else { '?' };
    (2..=pages)
        .map(|page| format!("{url}{separator}page={page}"))
        .collect()
}
