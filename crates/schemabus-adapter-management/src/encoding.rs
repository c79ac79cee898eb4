//! Path segment encoding for the RabbitMQ management API.
//!
//! Virtual host and exchange names are single path segments in API URLs, so
//! every character that would split or terminate a segment is escaped. The
//! default virtual host `/` therefore travels as `%2F`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside a management API path segment.
const SEGMENT_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'|');

/// Percent-encode a vhost or exchange name for use as one path segment.
///
/// # Examples
///
/// ```
/// use schemabus_adapter_management::encode_segment;
///
/// assert_eq!(encode_segment("/"), "%2F");
/// assert_eq!(encode_segment("orders.created"), "orders.created");
/// assert_eq!(encode_segment("my vhost"), "my%20vhost");
/// ```
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ESCAPE).to_string()
}

/// Decode a percent-encoded path segment.
///
/// # Errors
///
/// Returns error if the decoded bytes are not valid UTF-8.
///
/// # Examples
///
/// ```
/// use schemabus_adapter_management::decode_segment;
///
/// assert_eq!(decode_segment("%2F").unwrap(), "/");
/// ```
pub fn decode_segment(encoded: &str) -> Result<String, EncodingError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| EncodingError::Utf8Decode(e.to_string()))
}

/// Errors that can occur during decoding.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodingError {
    /// UTF-8 decoding failed
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vhost() {
        assert_eq!(encode_segment("/"), "%2F");
        assert_eq!(decode_segment("%2F").unwrap(), "/");
    }

    #[test]
    fn plain_names_pass_through() {
        for name in ["ev_b", "orders.created", "tenant-1:events"] {
            assert_eq!(encode_segment(name), name);
        }
    }

    #[test]
    fn separators_are_escaped() {
        let encoded = encode_segment("a/b?c#d");
        assert!(!encoded.contains('/'), "/ should be encoded: {encoded}");
        assert!(!encoded.contains('?'), "? should be encoded: {encoded}");
        assert!(!encoded.contains('#'), "# should be encoded: {encoded}");
        assert_eq!(decode_segment(&encoded).unwrap(), "a/b?c#d");
    }

    #[test]
    fn unicode_roundtrip() {
        let name = "события";
        assert_eq!(decode_segment(&encode_segment(name)).unwrap(), name);
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert!(decode_segment("%FF%FE").is_err());
    }
}
