//! Header parsing and formatting helpers.
//!
//! The engine only inspects a handful of response headers: the media type (to
//! decide whether a body is structured content), the declared length (for
//! progress and cache size estimates) and the content coding (to decide whether
//! a byte download needs decompressing).
//!
//! # Examples
//!
//! ```
//! use apiclient_http::protocol::{is_structured_media_type, parse_content_encoding, ContentEncoding};
//!
//! assert!(is_structured_media_type("application/json; charset=utf-8"));
//! assert!(is_structured_media_type("application/problem+json"));
//! assert!(!is_structured_media_type("text/plain"));
//!
//! assert_eq!(parse_content_encoding("gzip"), ContentEncoding::Gzip);
//! assert_eq!(parse_content_encoding("br"), ContentEncoding::Unsupported("br".to_string()));
//! ```

use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderMap;
use std::collections::BTreeMap;

/// Content coding declared by a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    /// No coding, or `identity`
    Identity,
    /// `gzip` / `x-gzip`
    Gzip,
    /// `deflate` (zlib-wrapped, as HTTP defines it)
    Deflate,
    /// Anything else; passed through undecoded
    Unsupported(String),
}

impl ContentEncoding {
    /// Whether a decoder has to be wrapped around the body stream.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        matches!(self, ContentEncoding::Gzip | ContentEncoding::Deflate)
    }
}

/// Parse a `Content-Encoding` header value.
///
/// Only the last coding in a comma-separated list matters to the reader, since
/// codings are listed in the order they were applied.
pub fn parse_content_encoding(value: &str) -> ContentEncoding {
    let last = value.rsplit(',').next().unwrap_or("").trim().to_ascii_lowercase();
    match last.as_str() {
        "" | "identity" => ContentEncoding::Identity,
        "gzip" | "x-gzip" => ContentEncoding::Gzip,
        "deflate" => ContentEncoding::Deflate,
        _ => ContentEncoding::Unsupported(last),
    }
}

/// Content coding of a response, `Identity` when the header is absent.
pub fn content_encoding(headers: &HeaderMap) -> ContentEncoding {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(parse_content_encoding)
        .unwrap_or(ContentEncoding::Identity)
}

/// Bare media type (`type/subtype`, lower-cased, parameters stripped).
pub fn media_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = raw.split(';').next()?.trim();
    if essence.is_empty() {
        None
    } else {
        Some(essence.to_ascii_lowercase())
    }
}

/// Whether a media type denotes JSON content (`application/json` or a `+json` suffix).
pub fn is_structured_media_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == super::constants::CONTENT_TYPE_JSON || essence.ends_with("+json")
}

/// Whether the response headers announce structured content.
pub fn has_structured_body(headers: &HeaderMap) -> bool {
    media_type(headers).is_some_and(|m| is_structured_media_type(&m))
}

/// Declared `Content-Length`, if present and numeric.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Flatten a header map for logging. Repeated headers are joined with `;`.
pub fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push(';');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_media_type_strips_parameters() {
        let h = headers(&[("content-type", "Application/JSON; charset=utf-8")]);
        assert_eq!(media_type(&h).as_deref(), Some("application/json"));
        assert!(has_structured_body(&h));
    }

    #[test]
    fn test_media_type_missing() {
        assert_eq!(media_type(&HeaderMap::new()), None);
        assert!(!has_structured_body(&HeaderMap::new()));
    }

    #[test]
    fn test_structured_suffix() {
        assert!(is_structured_media_type("application/vnd.api+json"));
        assert!(!is_structured_media_type("text/event-stream"));
    }

    #[test]
    fn test_content_length() {
        let h = headers(&[("content-length", "35588")]);
        assert_eq!(content_length(&h), Some(35588));
        let bad = headers(&[("content-length", "abc")]);
        assert_eq!(content_length(&bad), None);
    }

    #[test]
    fn test_content_encoding_variants() {
        assert_eq!(content_encoding(&HeaderMap::new()), ContentEncoding::Identity);
        assert_eq!(
            content_encoding(&headers(&[("content-encoding", "GZIP")])),
            ContentEncoding::Gzip
        );
        assert_eq!(parse_content_encoding("identity"), ContentEncoding::Identity);
        assert_eq!(parse_content_encoding("br, deflate"), ContentEncoding::Deflate);
        assert!(!parse_content_encoding("br").is_compressed());
    }

    #[test]
    fn test_headers_to_map_joins_repeats() {
        let h = headers(&[("set-cookie", "a=1"), ("set-cookie", "b=2"), ("x-id", "7")]);
        let map = headers_to_map(&h);
        assert_eq!(map.get("set-cookie").map(String::as_str), Some("a=1;b=2"));
        assert_eq!(map.get("x-id").map(String::as_str), Some("7"));
    }
}
