//! Document parsing and text extraction
//!
//! This module handles:
//! - HTML parsing (title, visible text, outgoing links)
//! - Whitespace normalization

mod html;

pub use html::*;

use url::Url;

/// Parsed page with extracted content
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// Extracted title (if found)
    pub title: Option<String>,

    /// Visible text content
    pub text: String,

    /// Absolute targets of every `a[href]`, in document order
    pub links: Vec<Url>,
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            // Before adding a non-whitespace char, handle accumulated whitespace
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    // Multiple newlines = paragraph break, preserve as double newline
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result.trim().to_string()
}

/// Collapse every whitespace run (newlines included) into one space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
