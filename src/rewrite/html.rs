//! HTML document rewriting.
//!
//! A streaming `lol_html` pass rewrites URL-bearing attributes on every
//! element, `srcset` candidate lists, inline and embedded CSS, and drops
//! framing-restriction `<meta http-equiv>` tags. A second pass over the
//! rewritten document places the `<base>` tag and the hook script, once the
//! first pass has settled whether the page declares its own `<base>`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lol_html::html_content::ContentType;
use lol_html::{element, end_tag, text, HtmlRewriter, Settings};

use super::{css, srcset, RewriteContext};
use crate::error::ProxyError;
use crate::hook;
use crate::security::headers::is_framing_meta;

/// Attributes holding a single URL, on any element.
const URL_ATTRIBUTES: [&str; 6] = ["href", "src", "action", "data", "poster", "formaction"];

/// Attributes holding an image candidate list.
const SRCSET_ATTRIBUTES: [&str; 2] = ["srcset", "imagesrcset"];

/// Rewrite a complete document served from `ctx.base()`.
pub fn rewrite_html(html: &str, ctx: &mut RewriteContext<'_>) -> Result<String, ProxyError> {
    let page_origin = ctx.base().origin().ascii_serialization();
    let rewritten = rewrite_references(html, ctx)?;

    let base_tag = if ctx.saw_base {
        None
    } else {
        Some(format!("<base href=\"{}/\">", page_origin))
    };
    let script = hook::render(ctx.canonicalizer(), ctx.base())?;

    insert_head_content(&rewritten, base_tag.as_deref(), &script)
}

fn rewrite_references(html: &str, ctx: &mut RewriteContext<'_>) -> Result<String, ProxyError> {
    let ctx = RefCell::new(ctx);
    let style_buffer = RefCell::new(String::new());
    let mut output = Vec::with_capacity(html.len() + html.len() / 4);

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("meta[http-equiv]", |el| {
                        let framing = el
                            .get_attribute("http-equiv")
                            .is_some_and(|value| is_framing_meta(value.trim()));
                        if framing {
                            el.remove();
                        }
                        Ok(())
                    }),
                    element!("base", |el| {
                        let mut guard = ctx.borrow_mut();
                        let ctx: &mut RewriteContext<'_> = &mut guard;
                        match el.get_attribute("href") {
                            Some(href) => ctx.adopt_base(&href),
                            None => ctx.saw_base = true,
                        }
                        Ok(())
                    }),
                    element!("*", |el| {
                        if el.tag_name().eq_ignore_ascii_case("base") {
                            return Ok(());
                        }
                        let mut guard = ctx.borrow_mut();
                        let ctx: &mut RewriteContext<'_> = &mut guard;

                        for name in URL_ATTRIBUTES {
                            if let Some(value) = el.get_attribute(name) {
                                if let Some(path) = ctx.rewrite_reference(&value) {
                                    el.set_attribute(name, &path)?;
                                }
                            }
                        }

                        for name in SRCSET_ATTRIBUTES {
                            if let Some(value) = el.get_attribute(name) {
                                let candidates = srcset::rewrite_srcset(&value, |url| {
                                    ctx.rewrite_reference(url)
                                });
                                if candidates != value {
                                    el.set_attribute(name, &candidates)?;
                                }
                            }
                        }

                        if let Some(style) = el.get_attribute("style") {
                            let rewritten = css::rewrite_css(&style, ctx);
                            if rewritten != style {
                                el.set_attribute("style", &rewritten)?;
                            }
                        }
                        Ok(())
                    }),
                    // Text chunks can split a stylesheet anywhere, so they
                    // are buffered until the end of the text node.
                    text!("style", |chunk| {
                        let mut buffer = style_buffer.borrow_mut();
                        buffer.push_str(chunk.as_str());
                        if chunk.last_in_text_node() {
                            let mut guard = ctx.borrow_mut();
                            let ctx: &mut RewriteContext<'_> = &mut guard;
                            let rewritten = css::rewrite_css(&buffer, ctx);
                            chunk.replace(&rewritten, ContentType::Html);
                            buffer.clear();
                        } else {
                            chunk.remove();
                        }
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(html.as_bytes())
            .map_err(|e| ProxyError::Rewrite(e.to_string()))?;
        rewriter.end().map_err(|e| ProxyError::Rewrite(e.to_string()))?;
    }

    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Base tag still owed to the document, if any, followed by the script.
fn pending_block(base_tag: Option<&str>, base_placed: &Cell<bool>, script: &str) -> String {
    let mut block = String::with_capacity(script.len() + 64);
    if let Some(tag) = base_tag {
        if !base_placed.replace(true) {
            block.push_str(tag);
        }
    }
    block.push_str(script);
    block
}

/// Place the `<base>` tag as the first child of `<head>` and the hook script
/// right before `</head>`. Without a closed head the script goes before
/// `<body>`, and without either it opens the document.
fn insert_head_content(
    html: &str,
    base_tag: Option<&str>,
    script: &str,
) -> Result<String, ProxyError> {
    let head_seen = Cell::new(false);
    let base_placed = Cell::new(base_tag.is_none());
    let script_placed = Rc::new(Cell::new(false));
    let script: Rc<str> = Rc::from(script);
    let mut output = Vec::with_capacity(html.len() + script.len() + 64);

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("head", |el| {
                        if head_seen.replace(true) {
                            return Ok(());
                        }
                        if let Some(tag) = base_tag {
                            if !base_placed.replace(true) {
                                el.prepend(tag, ContentType::Html);
                            }
                        }
                        let script = script.clone();
                        let placed = script_placed.clone();
                        // Not invoked when the head is closed implicitly.
                        el.on_end_tag(end_tag!(move |end| {
                            if !placed.replace(true) {
                                end.before(&script, ContentType::Html);
                            }
                            Ok(())
                        }))
                    }),
                    element!("body", |el| {
                        if !script_placed.replace(true) {
                            let block = pending_block(base_tag, &base_placed, &script);
                            el.before(&block, ContentType::Html);
                        }
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(html.as_bytes())
            .map_err(|e| ProxyError::Rewrite(e.to_string()))?;
        rewriter.end().map_err(|e| ProxyError::Rewrite(e.to_string()))?;
    }

    let mut document = String::from_utf8_lossy(&output).into_owned();
    if !script_placed.get() {
        document.insert_str(0, &pending_block(base_tag, &base_placed, &script));
    }
    Ok(document)
}
