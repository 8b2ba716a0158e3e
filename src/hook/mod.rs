//! Client hook script.
//!
//! Proxied HTML carries an inline script that patches the browser's
//! networking primitives so requests built at runtime also go through the
//! proxy. Every patched entry point funnels through one `proxyUrl` function
//! that applies the same rules as [`crate::canonical`].
//!
//! The script source lives in `hook.js`; only its configuration object is
//! generated per page.

use serde::Serialize;
use url::Url;

use crate::canonical::Canonicalizer;
use crate::error::ProxyError;

const HOOK_SOURCE: &str = include_str!("hook.js");
const CONFIG_PLACEHOLDER: &str = "__PROXY_HOOK_CONFIG__";

/// Attribute marking the injected `<script>` element.
pub const HOOK_MARKER: &str = "data-proxy-hook";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HookConfig<'a> {
    prefix: &'a str,
    ws_prefix: &'a str,
    base: &'a str,
}

/// Serialize `value` as JSON that is safe inside a `<script>` element.
pub fn embed_json<T: Serialize>(value: &T) -> Result<String, ProxyError> {
    let json = serde_json::to_string(value).map_err(|e| ProxyError::Rewrite(e.to_string()))?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

/// Render the complete `<script>` element for a page whose references
/// resolve against `base`.
pub fn render(canonicalizer: &Canonicalizer, base: &Url) -> Result<String, ProxyError> {
    let config = embed_json(&HookConfig {
        prefix: canonicalizer.proxy_prefix(),
        ws_prefix: canonicalizer.websocket_prefix(),
        base: base.as_str(),
    })?;

    Ok(format!(
        "<script {}>{}</script>",
        HOOK_MARKER,
        HOOK_SOURCE.replacen(CONFIG_PLACEHOLDER, &config, 1)
    ))
}
