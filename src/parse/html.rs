//! HTML parsing and text extraction

use super::{normalize_whitespace, ParsedDocument};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose contents are never shown to a reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that break the text flow
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

/// Parse an HTML page: title, visible text and links resolved against `base`
pub fn parse_html(content: &str, base: &Url) -> ParsedDocument {
    let document = Html::parse_document(content);
    let mut doc = ParsedDocument::default();

    // Extract title
    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_elem) = document.select(&selector).next() {
            let title = title_elem.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                doc.title = Some(title);
            }
        }
    }

    doc.text = visible_text(&document);

    // Extract links
    if let Ok(selector) = Selector::parse("a[href]") {
        for elem in document.select(&selector) {
            if let Some(href) = elem.value().attr("href") {
                if let Ok(url) = base.join(href.trim()) {
                    doc.links.push(url);
                }
            }
        }
    }

    doc
}

/// Visible text of an HTML document or fragment (title and body, no scripts)
pub fn extract_text(content: &str) -> String {
    visible_text(&Html::parse_document(content))
}

fn visible_text(document: &Html) -> String {
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);
    normalize_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_ELEMENTS.contains(&name) {
        return;
    }

    let is_block = BLOCK_ELEMENTS.contains(&name);
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(child_elem) = ElementRef::wrap(child) {
            collect_text(child_elem, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }

    if is_block {
        out.push('\n');
    }
}
