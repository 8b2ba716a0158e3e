//! Reference resolution rules.

use url::Url;

use crate::error::ProxyError;

/// Outcome of resolving a reference against a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Leave the reference exactly as written.
    Unchanged,
    /// Route this absolute URL through the proxy.
    Absolute(Url),
}

const PASSTHROUGH_SCHEMES: [&str; 3] = ["data:", "blob:", "javascript:"];

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// True for references that are never proxied (inline data, fragments, script URLs).
pub fn is_passthrough(reference: &str) -> bool {
    let trimmed = reference.trim_start();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || PASSTHROUGH_SCHEMES
            .iter()
            .any(|scheme| starts_with_ignore_case(trimmed, scheme))
}

/// Resolve `reference` against `base`.
///
/// `own_prefixes` are the proxy's mount points; references already under one
/// of them are left alone so rewriting is idempotent.
pub fn resolve_reference(
    reference: &str,
    base: &Url,
    own_prefixes: &[&str],
) -> Result<Resolved, ProxyError> {
    if is_passthrough(reference) {
        return Ok(Resolved::Unchanged);
    }

    let trimmed = reference.trim();
    if own_prefixes.iter().any(|prefix| trimmed.starts_with(prefix)) {
        return Ok(Resolved::Unchanged);
    }

    let absolute = base.join(trimmed).map_err(|_| ProxyError::InvalidUrl {
        reference: reference.to_string(),
    })?;

    match absolute.scheme() {
        "http" | "https" => Ok(Resolved::Absolute(absolute)),
        _ => Ok(Resolved::Unchanged),
    }
}

/// Parse a top-level target, defaulting bare hosts to `https://`.
pub fn parse_entry_target(raw: &str) -> Result<Url, ProxyError> {
    parse_with_default(raw, &["http://", "https://"], "https://")
}

/// Parse a WebSocket target, defaulting bare hosts to `wss://` and mapping
/// `http(s)` onto `ws(s)`.
pub fn parse_websocket_target(raw: &str) -> Result<Url, ProxyError> {
    let mut url = parse_with_default(raw, &["ws://", "wss://", "http://", "https://"], "wss://")?;
    let mapped = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = mapped {
        url.set_scheme(scheme).map_err(|_| ProxyError::InvalidUrl {
            reference: raw.to_string(),
        })?;
    }
    Ok(url)
}

fn parse_with_default(
    raw: &str,
    accepted: &[&str],
    default_scheme: &str,
) -> Result<Url, ProxyError> {
    let invalid = || ProxyError::InvalidUrl {
        reference: raw.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let candidate = if accepted.iter().any(|scheme| starts_with_ignore_case(trimmed, scheme)) {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("{}{}", default_scheme, rest)
    } else {
        format!("{}{}", default_scheme, trimmed)
    };

    let url = Url::parse(&candidate).map_err(|_| invalid())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid()),
    }
}
