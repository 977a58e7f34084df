//! Query-aware snippet extraction

use crate::config::SearchConfig;
use crate::lemma::Lemmatizer;
use crate::parse::{collapse_whitespace, extract_text};
use std::collections::HashSet;

/// Pick the passage of `content` that mentions the most distinct query lemmas,
/// with every matching word wrapped in `<b>...</b>`.
///
/// Returns `None` when no passage mentions any query lemma.
pub fn build_snippet(
    lemmatizer: &Lemmatizer,
    content: &str,
    query_lemmas: &HashSet<String>,
    config: &SearchConfig,
) -> Option<String> {
    if query_lemmas.is_empty() {
        return None;
    }

    let text = collapse_whitespace(&extract_text(content));
    let chunks: Vec<&str> = split_sentences(&text)
        .into_iter()
        .flat_map(|s| split_long(s, config.sentence_split_chars, config.sentence_cut_after_chars))
        .collect();

    let mut best: Option<(usize, String)> = None;
    for window in windows(&chunks, config.snippet_window_chars) {
        let (score, highlighted) = highlight(lemmatizer, &window, query_lemmas);
        if score > 0 && best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, highlighted));
        }
    }

    best.map(|(_, snippet)| snippet)
}

/// Sentences end right after `.`, `!` or `?`
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

/// Cut sentences longer than `max_chars` at the first whitespace at or after
/// `cut_after` characters.
fn split_long(sentence: &str, max_chars: usize, cut_after: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = sentence;

    while rest.chars().count() > max_chars {
        let cut = rest
            .char_indices()
            .skip(cut_after)
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, _)| i);

        match cut {
            Some(i) => {
                push_trimmed(&mut parts, &rest[..i]);
                rest = rest[i..].trim_start();
            }
            None => break,
        }
    }

    push_trimmed(&mut parts, rest);
    parts
}

/// Greedily join chunks; a window closes once it grows past `max_chars`
fn windows(chunks: &[&str], max_chars: usize) -> Vec<String> {
    let mut windows = Vec::new();
    let mut current = String::new();

    for chunk in chunks {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(chunk);

        if current.chars().count() > max_chars {
            windows.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        windows.push(current);
    }
    windows
}

/// Score a window by distinct query lemmas and bold every matching word
fn highlight(
    lemmatizer: &Lemmatizer,
    window: &str,
    query_lemmas: &HashSet<String>,
) -> (usize, String) {
    let mut matched = HashSet::new();
    let mut out = String::with_capacity(window.len() + 16);
    let mut word_start: Option<usize> = None;

    let mut flush = |out: &mut String, word: &str| match lemmatizer.normal_form(word) {
        Some(lemma) if query_lemmas.contains(&lemma) => {
            out.push_str("<b>");
            out.push_str(word);
            out.push_str("</b>");
            matched.insert(lemma);
        }
        _ => out.push_str(word),
    };

    for (i, c) in window.char_indices() {
        if lemmatizer.is_word_char(c) {
            word_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = word_start.take() {
            flush(&mut out, &window[start..i]);
        }
        out.push(c);
    }
    if let Some(start) = word_start {
        flush(&mut out, &window[start..]);
    }

    (matched.len(), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::{DictionaryAnalyzer, PartOfSpeech};
    use std::sync::Arc;

    fn lemmatizer() -> Lemmatizer {
        let analyzer = DictionaryAnalyzer::new(true)
            .with_entry("леса", "лес", PartOfSpeech::Noun)
            .with_entry("лесу", "лес", PartOfSpeech::Noun)
            .with_entry("волки", "волк", PartOfSpeech::Noun);
        Lemmatizer::new(Arc::new(analyzer))
    }

    fn query(lemmas: &[&str]) -> HashSet<String> {
        lemmas.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_highlights_surface_forms() {
        let snippet = build_snippet(
            &lemmatizer(),
            "<p>Волки живут в лесу. Лесник тоже.</p>",
            &query(&["лес", "волк"]),
            &SearchConfig::default(),
        )
        .unwrap();

        assert_eq!(snippet, "<b>Волки</b> живут в <b>лесу</b>. Лесник тоже.");
    }

    #[test]
    fn test_no_match_gives_none() {
        let snippet = build_snippet(
            &lemmatizer(),
            "<p>Поле и река.</p>",
            &query(&["лес"]),
            &SearchConfig::default(),
        );
        assert!(snippet.is_none());
    }

    #[test]
    fn test_picks_best_window() {
        let config = SearchConfig {
            snippet_window_chars: 20,
            ..SearchConfig::default()
        };
        let html = "<p>Только лес здесь стоит. Дальше река течёт. Волки бегут в лесу рядом.</p>";

        let snippet =
            build_snippet(&lemmatizer(), html, &query(&["лес", "волк"]), &config).unwrap();
        assert_eq!(
            snippet,
            "Дальше река течёт. <b>Волки</b> бегут в <b>лесу</b> рядом."
        );
    }

    #[test]
    fn test_split_sentences_keeps_terminators() {
        assert_eq!(
            split_sentences("Один. Два! Три? Хвост"),
            vec!["Один.", "Два!", "Три?", "Хвост"]
        );
    }

    #[test]
    fn test_split_long_sentence() {
        let sentence = format!("{} {}", "а".repeat(150), "б".repeat(100));
        let parts = split_long(&sentence, 200, 100);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].chars().count(), 150);
        assert_eq!(parts[1].chars().count(), 100);

        // No whitespace to cut at: kept whole
        let solid = "в".repeat(250);
        assert_eq!(split_long(&solid, 200, 100), vec![solid.as_str()]);
    }

    #[test]
    fn test_windows_close_past_limit() {
        let chunks = ["aaaa", "bbbb", "cccc"];
        assert_eq!(windows(&chunks, 6), vec!["aaaa bbbb", "cccc"]);
    }
}
