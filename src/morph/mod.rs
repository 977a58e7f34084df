//! Morphological analysis
//!
//! A [`MorphologyAnalyzer`] maps a single lower-cased word to its candidate
//! normal forms, each tagged with a part of speech. The lemmatizer only needs
//! two things from it: which characters make up words, and whether a word is
//! a function word (conjunction, preposition, particle, interjection).

mod dictionary;

pub use dictionary::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Part of speech of a single analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Numeral,
    Conjunction,
    Preposition,
    Particle,
    Interjection,
    Unknown,
}

impl PartOfSpeech {
    /// Function words carry no meaning for search and are never indexed
    pub fn is_function_word(self) -> bool {
        matches!(
            self,
            PartOfSpeech::Conjunction
                | PartOfSpeech::Preposition
                | PartOfSpeech::Particle
                | PartOfSpeech::Interjection
        )
    }
}

impl std::fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            PartOfSpeech::Noun => "NOUN",
            PartOfSpeech::Verb => "VERB",
            PartOfSpeech::Adjective => "ADJF",
            PartOfSpeech::Adverb => "ADVB",
            PartOfSpeech::Pronoun => "NPRO",
            PartOfSpeech::Numeral => "NUMR",
            PartOfSpeech::Conjunction => "CONJ",
            PartOfSpeech::Preposition => "PREP",
            PartOfSpeech::Particle => "PRCL",
            PartOfSpeech::Interjection => "INTJ",
            PartOfSpeech::Unknown => "UNKN",
        };
        write!(f, "{}", tag)
    }
}

impl FromStr for PartOfSpeech {
    type Err = Error;

    /// Accepts OpenCorpora tags (NOUN, CONJ, ...) and the short Russian
    /// tags used by Lucene morphology dictionaries (С, СОЮЗ, ...).
    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim().to_uppercase();
        let pos = match tag.as_str() {
            "NOUN" | "С" => PartOfSpeech::Noun,
            "VERB" | "INFN" | "PRTF" | "PRTS" | "GRND" | "Г" | "ИНФИНИТИВ" | "ПРИЧАСТИЕ"
            | "ДЕЕПРИЧАСТИЕ" => PartOfSpeech::Verb,
            "ADJF" | "ADJS" | "COMP" | "П" | "КР_ПРИЛ" => PartOfSpeech::Adjective,
            "ADVB" | "PRED" | "Н" | "ПРЕДК" => PartOfSpeech::Adverb,
            "NPRO" | "МС" | "МС-П" | "МС-ПРЕДК" => PartOfSpeech::Pronoun,
            "NUMR" | "ЧИСЛ" | "ЧИСЛ-П" => PartOfSpeech::Numeral,
            "CONJ" | "СОЮЗ" => PartOfSpeech::Conjunction,
            "PREP" | "ПРЕДЛ" => PartOfSpeech::Preposition,
            "PRCL" | "ЧАСТ" => PartOfSpeech::Particle,
            "INTJ" | "МЕЖД" => PartOfSpeech::Interjection,
            "UNKN" => PartOfSpeech::Unknown,
            _ => {
                return Err(Error::Morphology(format!(
                    "Unknown part-of-speech tag: {}",
                    s
                )))
            }
        };
        Ok(pos)
    }
}

/// One candidate analysis of a word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordForm {
    /// Dictionary (normal) form
    pub normal_form: String,

    /// Part of speech of this candidate
    pub part_of_speech: PartOfSpeech,
}

impl WordForm {
    pub fn new(normal_form: impl Into<String>, part_of_speech: PartOfSpeech) -> Self {
        Self {
            normal_form: normal_form.into(),
            part_of_speech,
        }
    }
}

/// A language's morphology, as seen by the lemmatizer
pub trait MorphologyAnalyzer: Send + Sync {
    /// Whether `c` belongs to this language's word alphabet (lower case)
    fn is_word_char(&self, c: char) -> bool;

    /// All candidate analyses of a lower-cased word, most likely first.
    ///
    /// Returns an error when the word cannot be analyzed at all.
    fn analyze(&self, word: &str) -> Result<Vec<WordForm>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("NOUN".parse::<PartOfSpeech>().unwrap(), PartOfSpeech::Noun);
        assert_eq!("conj".parse::<PartOfSpeech>().unwrap(), PartOfSpeech::Conjunction);
        assert_eq!("ПРЕДЛ".parse::<PartOfSpeech>().unwrap(), PartOfSpeech::Preposition);
        assert_eq!("С".parse::<PartOfSpeech>().unwrap(), PartOfSpeech::Noun);
        assert_eq!("МЕЖД".parse::<PartOfSpeech>().unwrap(), PartOfSpeech::Interjection);
        assert!("XYZ".parse::<PartOfSpeech>().is_err());
    }

    #[test]
    fn test_function_words() {
        assert!(PartOfSpeech::Conjunction.is_function_word());
        assert!(PartOfSpeech::Particle.is_function_word());
        assert!(!PartOfSpeech::Noun.is_function_word());
        assert!(!PartOfSpeech::Unknown.is_function_word());
    }

    #[test]
    fn test_display_round_trips() {
        for pos in [PartOfSpeech::Verb, PartOfSpeech::Preposition, PartOfSpeech::Unknown] {
            assert_eq!(pos.to_string().parse::<PartOfSpeech>().unwrap(), pos);
        }
    }
}
