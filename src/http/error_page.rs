//! Fixed HTML error page served when a proxied request is aborted.

use axum::http::header::{self, HeaderValue};
use axum::response::{Html, IntoResponse, Response};

use crate::error::ProxyError;

const STYLE: &str = "body{background:#0a0a0a;color:#fff;font-family:Arial,sans-serif;\
    padding:40px;text-align:center}\
    h1{color:#f44}\
    .error{background:rgba(255,68,68,0.1);border:1px solid #f44;border-radius:8px;\
    padding:20px;margin:20px auto 0;max-width:600px}\
    a{color:#4a9eff;text-decoration:none}\
    code{background:#222;padding:2px 6px;border-radius:4px;font-size:12px}";

/// Minimal escaping for text placed in element content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Page body for `err`, linking back to `home`.
pub fn page(err: &ProxyError, home: &str) -> String {
    let (title, summary, detail) = match err {
        ProxyError::BlockedDomain { .. } => (
            "Site Blocked",
            "This site cannot be proxied",
            format!("<p>{}</p>", escape_html(&err.user_message())),
        ),
        _ => (
            "Proxy Error",
            "Failed to load site",
            format!(
                "<p><code>{}</code></p>\
                 <p style=\"margin-top:20px;\">Some sites block proxies. Try a different site.</p>",
                escape_html(&err.user_message())
            ),
        ),
    };

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head>\
         <body><h1>{title}</h1><div class=\"error\"><p><strong>{summary}</strong></p>{detail}\
         <p style=\"margin-top:20px;\">\
         <a href=\"{home}\" target=\"_top\">&larr; Go Home</a></p></div></body></html>",
        home = escape_html(home),
    )
}

/// Render the error page with the status matching the error kind.
pub fn render_with_home(err: &ProxyError, home: &str) -> Response {
    let mut response = (err.status(), Html(page(err, home))).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub fn render(err: &ProxyError) -> Response {
    render_with_home(err, "/")
}
