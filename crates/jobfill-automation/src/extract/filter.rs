//! Attribute-filtered, whitespace-collapsed HTML for the decision oracle.

use scraper::{ElementRef, Html, Node, Selector};

/// Attributes that say something about a control; everything else is dropped.
const KEEP_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "type",
    "value",
    "for",
    "href",
    "action",
    "method",
    "role",
    "aria-label",
    "data-automation-id",
    "data-testid",
    "required",
    "checked",
    "selected",
    "disabled",
    "readonly",
    "multiple",
    "min",
    "max",
    "maxlength",
    "pattern",
    "accept",
    "autocomplete",
];

/// Subtrees removed entirely.
const REMOVE_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "path", "meta", "link", "head", "iframe", "object",
    "embed", "canvas", "video", "audio", "source", "track", "map", "area", "picture", "template",
];

const VOID_TAGS: &[&str] = &[
    "input", "img", "br", "hr", "meta", "link", "base", "col", "embed", "source", "track", "wbr",
    "area",
];

/// Upper bound on the filtered HTML handed to the oracle, in characters.
pub const MAX_HTML_CHARS: usize = 50_000;

/// Strip `html` down to structure the oracle needs: allow-listed
/// attributes, no script/style/media subtrees, collapsed whitespace,
/// capped at [`MAX_HTML_CHARS`].
pub fn filter_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut out = String::with_capacity(html.len() / 2);
    write_children(&root, &mut out);

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed.replace("> <", "><"), MAX_HTML_CHARS)
}

fn write_children(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push_str(&escape_text(trimmed));
                }
            }
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    write_element(&child_ref, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: &ElementRef, out: &mut String) {
    let tag = element.value().name().to_ascii_lowercase();
    if REMOVE_TAGS.contains(&tag.as_str()) {
        return;
    }

    out.push('<');
    out.push_str(&tag);
    for (name, value) in element.value().attrs() {
        let name = name.to_ascii_lowercase();
        if !KEEP_ATTRIBUTES.contains(&name.as_str()) {
            continue;
        }
        out.push(' ');
        out.push_str(&name);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&tag.as_str()) {
        return;
    }
    write_children(element, out);
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
