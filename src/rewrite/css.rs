//! CSS reference rewriting.
//!
//! Handles `url(...)` in all three quoting forms and the string form of
//! `@import`. Rewritten references are always emitted double-quoted; a
//! reference that is kept is left byte-identical, quotes and whitespace
//! included.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::RewriteContext;

static URL_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s]+))\s*\)"#)
        .expect("url() pattern is valid")
});

static IMPORT_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).expect("@import pattern is valid")
});

fn captured<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str())
}

/// Rewrite every reference in a stylesheet or inline `style` value.
pub fn rewrite_css(css: &str, ctx: &mut RewriteContext<'_>) -> String {
    let urls = URL_FUNCTION.replace_all(css, |caps: &Captures<'_>| {
        match ctx.rewrite_reference(captured(caps)) {
            Some(path) => format!("url(\"{}\")", path),
            None => caps[0].to_string(),
        }
    });

    IMPORT_STRING
        .replace_all(&urls, |caps: &Captures<'_>| {
            match ctx.rewrite_reference(captured(caps)) {
                Some(path) => format!("@import \"{}\"", path),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
