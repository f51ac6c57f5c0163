//! Protocol constants and header helpers shared by the client and the cache.

mod headers;

pub use headers::{
    content_encoding, content_length, has_structured_body, headers_to_map, is_structured_media_type,
    media_type, parse_content_encoding, ContentEncoding,
};

/// Protocol constants.
pub mod constants {
    /// JSON media type.
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    /// Server-sent events media type.
    pub const CONTENT_TYPE_SSE: &str = "text/event-stream";
    /// Codings the byte downloader can undo.
    pub const ACCEPT_ENCODING_COMPRESSED: &str = "gzip, deflate";
    /// Two-character sequence closing a streamed chunk that holds complete messages.
    pub const STREAM_TERMINATOR: &str = "\n\n";
}
