//! Text lemmatization
//!
//! Turns free text into a histogram of normal forms, dropping function words
//! and tokens too short or too long to be meaningful.

use crate::morph::MorphologyAnalyzer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Shortest token that is analyzed, in characters
pub const MIN_WORD_CHARS: usize = 2;

/// Longest token that is analyzed, in characters
pub const MAX_WORD_CHARS: usize = 49;

/// Lemmatizer over a shared morphology analyzer
#[derive(Clone)]
pub struct Lemmatizer {
    analyzer: Arc<dyn MorphologyAnalyzer>,
}

impl Lemmatizer {
    pub fn new(analyzer: Arc<dyn MorphologyAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Count the normal forms of every content word in `text`
    pub fn lemmatize(&self, text: &str) -> HashMap<String, u32> {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .map(|c| if self.analyzer.is_word_char(c) { c } else { ' ' })
            .collect();

        let mut counts = HashMap::new();
        for word in cleaned.split_whitespace() {
            if let Some(lemma) = self.normal_form(word) {
                *counts.entry(lemma).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Normal form of a single word, or `None` when the word is not indexed
    /// (wrong length, a function word, or not analyzable).
    pub fn normal_form(&self, word: &str) -> Option<String> {
        let word = word.to_lowercase();
        let len = word.chars().count();
        if !(MIN_WORD_CHARS..=MAX_WORD_CHARS).contains(&len) {
            return None;
        }

        let forms = match self.analyzer.analyze(&word) {
            Ok(forms) => forms,
            Err(e) => {
                trace!(word = %word, error = %e, "Skipping unanalyzable word");
                return None;
            }
        };

        if forms.iter().any(|f| f.part_of_speech.is_function_word()) {
            return None;
        }

        forms.into_iter().next().map(|f| f.normal_form)
    }

    /// Whether `c` can be part of a word (case-insensitive)
    pub fn is_word_char(&self, c: char) -> bool {
        c.to_lowercase().all(|lc| self.analyzer.is_word_char(lc))
    }
}

impl std::fmt::Debug for Lemmatizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lemmatizer").finish_non_exhaustive()
    }
}
