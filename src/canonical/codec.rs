//! Percent-encoding of absolute URLs into a single path segment.
//!
//! The encode set matches ECMAScript `encodeURIComponent`, which is what the
//! injected hook script uses, so both sides produce identical proxy paths.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ProxyError;

/// Characters left alone by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode a string as one path segment.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Exact inverse of [`encode_component`].
pub fn decode_component(input: &str) -> Result<String, ProxyError> {
    percent_decode_str(input)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ProxyError::InvalidUrl {
            reference: input.to_string(),
        })
}
