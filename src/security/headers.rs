//! Header policy.
//!
//! # Responsibilities
//! - Identify framing-restriction headers stripped from proxied responses
//! - Identify hop-by-hop headers
//!
//! Request headers are not filtered here: `upstream::browser` builds the
//! outbound set from an allowlist.

/// Response headers that prevent the page from being framed under the proxy origin.
pub const FRAMING_HEADERS: [&str; 4] = [
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
    "strict-transport-security",
];

/// Values of `<meta http-equiv>` removed from proxied documents.
pub const FRAMING_META_EQUIVS: [&str; 3] = [
    "content-security-policy",
    "content-security-policy-report-only",
    "x-frame-options",
];

/// Hop-by-hop headers (RFC 7230 §6.1) plus body framing headers that no
/// longer describe a decoded or rewritten body.
pub const HOP_BY_HOP_HEADERS: [&str; 11] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
];

pub fn is_framing_header(name: &str) -> bool {
    FRAMING_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
}

pub fn is_framing_meta(http_equiv: &str) -> bool {
    let value = http_equiv.trim();
    FRAMING_META_EQUIVS.iter().any(|h| value.eq_ignore_ascii_case(h))
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
}
