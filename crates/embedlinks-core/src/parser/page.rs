//! Rendered page inspection
//!
//! Detects the embed site's "title does not exist" state from page HTML.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// Phrases the embed site shows instead of a player when a title is missing
pub const NOT_FOUND_MARKERS: &[&str] = &["404", "no existe", "no encontrado", "not found"];

fn marker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = NOT_FOUND_MARKERS
            .iter()
            .map(|m| regex::escape(m))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!("(?i)(?:{})", alternation)).ok()
    })
    .as_ref()
}

/// Visible text of the page body
///
/// Script, style and noscript contents are skipped so inline payloads
/// (which may contain arbitrary digits) do not count as visible text.
pub fn body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };

    let mut out = String::new();
    if let Some(body) = document.select(&selector).next() {
        collect_text(body, &mut out);
    }
    out
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if matches!(el.name(), "script" | "style" | "noscript" | "template") {
                    continue;
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

/// Returns the "not found" marker present in the page body, if any
///
/// Matching is a case-insensitive substring search over the visible
/// body text.
pub fn find_not_found_marker(html: &str) -> Option<String> {
    let text = body_text(html);
    marker_regex()?
        .find(&text)
        .map(|m| m.as_str().to_lowercase())
}
