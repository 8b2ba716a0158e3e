//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! upstream body + Content-Type
//!     → ContentKind (dispatch)
//!     → html.rs (attributes, srcset, inline CSS, meta removal, <base>, hook)
//!     → css.rs  (url(), @import)
//!     → passthrough (script, JSON, other text, binary)
//! ```
//!
//! # Design Decisions
//! - Every reference goes through the same [`Canonicalizer`] the client hook mirrors
//! - A reference that fails to resolve is kept byte-identical
//! - Bodies are treated as UTF-8

pub mod css;
pub mod html;
pub mod srcset;

use bytes::Bytes;
use url::Url;

use crate::canonical::Canonicalizer;
use crate::error::ProxyError;

/// Rewriting strategy selected from the declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Script,
    Text,
    Binary,
}

impl ContentKind {
    /// Classify a `Content-Type` value. Parameters are ignored; a missing
    /// type is treated as opaque.
    pub fn from_content_type(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => ContentKind::Html,
            "text/css" => ContentKind::Css,
            m if m.contains("javascript")
                || m.contains("ecmascript")
                || m == "application/json"
                || m.ends_with("+json") =>
            {
                ContentKind::Script
            }
            m if m.starts_with("text/") => ContentKind::Text,
            _ => ContentKind::Binary,
        }
    }

    /// Whether the body is transformed before it is served.
    pub fn is_rewritten(self) -> bool {
        matches!(self, ContentKind::Html | ContentKind::Css)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Html => "html",
            ContentKind::Css => "css",
            ContentKind::Script => "script",
            ContentKind::Text => "text",
            ContentKind::Binary => "binary",
        }
    }
}

/// Per-response rewriting state.
#[derive(Debug)]
pub struct RewriteContext<'a> {
    canonicalizer: &'a Canonicalizer,
    base: Url,
    /// References replaced by a proxy path.
    pub rewritten: usize,
    /// References kept verbatim (passthrough or unresolvable).
    pub skipped: usize,
    /// The document carried its own `<base>` element.
    pub saw_base: bool,
}

impl<'a> RewriteContext<'a> {
    pub fn new(canonicalizer: &'a Canonicalizer, base: Url) -> Self {
        Self {
            canonicalizer,
            base,
            rewritten: 0,
            skipped: 0,
            saw_base: false,
        }
    }

    pub fn canonicalizer(&self) -> &'a Canonicalizer {
        self.canonicalizer
    }

    /// Current resolution base.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Apply a document `<base href>`; an unresolvable value is ignored.
    pub fn adopt_base(&mut self, href: &str) {
        self.saw_base = true;
        match self.base.join(href.trim()) {
            Ok(url) => self.base = url,
            Err(e) => tracing::debug!(href = %href, error = %e, "Ignoring invalid <base href>"),
        }
    }

    /// Rewrite one reference; `None` keeps the original text.
    pub fn rewrite_reference(&mut self, reference: &str) -> Option<String> {
        let result = self.canonicalizer.rewrite(reference, &self.base);
        match result {
            Some(_) => self.rewritten += 1,
            None => self.skipped += 1,
        }
        result
    }
}

/// Result of rewriting one body.
#[derive(Debug)]
pub struct RewriteOutcome {
    pub body: Bytes,
    pub rewritten: usize,
    pub skipped: usize,
}

/// Dispatches bodies to the matching rewriter.
#[derive(Debug, Clone)]
pub struct Rewriter {
    canonicalizer: Canonicalizer,
}

impl Rewriter {
    pub fn new(canonicalizer: Canonicalizer) -> Self {
        Self { canonicalizer }
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Rewrite `body` served from `base` (the final URL after redirects).
    pub fn rewrite(
        &self,
        kind: ContentKind,
        body: Bytes,
        base: &Url,
    ) -> Result<RewriteOutcome, ProxyError> {
        let mut ctx = RewriteContext::new(&self.canonicalizer, base.clone());

        let body = match kind {
            ContentKind::Html => {
                let text = String::from_utf8_lossy(&body);
                Bytes::from(html::rewrite_html(&text, &mut ctx)?)
            }
            ContentKind::Css => {
                let text = String::from_utf8_lossy(&body);
                Bytes::from(css::rewrite_css(&text, &mut ctx))
            }
            ContentKind::Script | ContentKind::Text | ContentKind::Binary => body,
        };

        tracing::debug!(
            kind = kind.as_str(),
            base = %base,
            rewritten = ctx.rewritten,
            skipped = ctx.skipped,
            "Body rewritten"
        );

        Ok(RewriteOutcome {
            body,
            rewritten: ctx.rewritten,
            skipped: ctx.skipped,
        })
    }
}
