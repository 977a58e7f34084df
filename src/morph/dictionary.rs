//! Dictionary-backed Russian analyzer

use super::{MorphologyAnalyzer, PartOfSpeech, WordForm};
use crate::config::MorphologyConfig;
use crate::error::{Error, Result};
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, trace};

const CONJUNCTIONS: &[&str] = &[
    "и", "а", "но", "или", "либо", "да", "что", "чтобы", "если", "как", "когда", "зато",
    "однако", "тоже", "также", "причем", "притом", "хотя", "пока", "будто", "словно",
    "ибо", "поскольку", "потому", "нежели", "ни",
];

const PREPOSITIONS: &[&str] = &[
    "в", "во", "на", "с", "со", "к", "ко", "по", "о", "об", "обо", "от", "ото", "до", "из",
    "изо", "за", "для", "без", "безо", "под", "подо", "над", "надо", "при", "про", "через",
    "у", "перед", "передо", "между", "среди", "около", "вокруг", "сквозь", "ради", "возле",
    "после", "кроме", "вместо", "вдоль", "против", "из-за", "из-под",
];

const PARTICLES: &[&str] = &[
    "не", "же", "ли", "бы", "б", "вот", "вон", "только", "даже", "уже", "ведь", "лишь",
    "разве", "неужели", "пусть", "пускай", "давай", "именно", "ещё", "еще", "ну", "то",
    "нибудь", "либо",
];

const INTERJECTIONS: &[&str] = &[
    "ох", "ах", "эх", "ой", "ай", "ух", "увы", "ура", "эй", "ого", "ага", "фу", "тьфу",
    "браво", "алло", "ну-ка",
];

fn russian_stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::Russian))
}

/// Russian analyzer backed by a built-in function-word lexicon and an
/// optional word-form dictionary. Words missing from both are reduced with
/// the Snowball Russian stemmer when unknown words are accepted.
///
/// Dictionary lines have the form `form<TAB>lemma<TAB>TAG`. Blank lines and
/// lines starting with `#` are ignored. A form may appear on several lines;
/// its analyses keep file order.
#[derive(Debug, Clone)]
pub struct DictionaryAnalyzer {
    entries: HashMap<String, Vec<WordForm>>,
    accept_unknown: bool,
}

impl DictionaryAnalyzer {
    /// Analyzer with only the built-in function words
    pub fn new(accept_unknown: bool) -> Self {
        let mut analyzer = Self {
            entries: HashMap::new(),
            accept_unknown,
        };

        for (words, pos) in [
            (CONJUNCTIONS, PartOfSpeech::Conjunction),
            (PREPOSITIONS, PartOfSpeech::Preposition),
            (PARTICLES, PartOfSpeech::Particle),
            (INTERJECTIONS, PartOfSpeech::Interjection),
        ] {
            for word in words {
                analyzer.insert(word, word, pos);
            }
        }

        analyzer
    }

    /// Build the analyzer described by the morphology configuration
    pub fn from_config(config: &MorphologyConfig) -> Result<Self> {
        if config.language.to_lowercase() != "russian" {
            return Err(Error::Morphology(format!(
                "No analyzer for language: {}",
                config.language
            )));
        }

        let mut analyzer = Self::new(config.accept_unknown_words);
        if let Some(path) = &config.dictionary {
            analyzer.load_tsv(path)?;
        }
        Ok(analyzer)
    }

    /// Add one analysis (builder style)
    pub fn with_entry(mut self, form: &str, lemma: &str, pos: PartOfSpeech) -> Self {
        self.insert(form, lemma, pos);
        self
    }

    /// Load dictionary entries from a TSV file
    pub fn load_tsv(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let count = self.load_str(&content)?;
        info!("Loaded {} dictionary entries from {:?}", count, path);
        Ok(count)
    }

    fn load_str(&mut self, content: &str) -> Result<usize> {
        let mut count = 0;
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [form, lemma, tag] = fields.as_slice() else {
                return Err(Error::Morphology(format!(
                    "Malformed dictionary line {}: expected 3 tab-separated fields",
                    line_no + 1
                )));
            };

            let pos: PartOfSpeech = tag.parse()?;
            self.insert(form, lemma, pos);
            count += 1;
        }
        Ok(count)
    }

    fn insert(&mut self, form: &str, lemma: &str, pos: PartOfSpeech) {
        let forms = self.entries.entry(form.to_lowercase()).or_default();
        let candidate = WordForm::new(lemma.to_lowercase(), pos);
        if !forms.contains(&candidate) {
            forms.push(candidate);
        }
    }
}

impl MorphologyAnalyzer for DictionaryAnalyzer {
    fn is_word_char(&self, c: char) -> bool {
        matches!(c, 'а'..='я' | 'ё')
    }

    fn analyze(&self, word: &str) -> Result<Vec<WordForm>> {
        if let Some(forms) = self.entries.get(word) {
            return Ok(forms.clone());
        }

        if !word.chars().all(|c| self.is_word_char(c)) {
            return Err(Error::Morphology(format!("Not a Russian word: {}", word)));
        }

        if self.accept_unknown {
            let stem = russian_stemmer().stem(word);
            trace!(word = %word, stem = %stem, "Stemming unknown word");
            if stem.is_empty() {
                return Ok(vec![WordForm::new(word, PartOfSpeech::Unknown)]);
            }
            Ok(vec![WordForm::new(stem, PartOfSpeech::Unknown)])
        } else {
            Err(Error::Morphology(format!("Unknown word: {}", word)))
        }
    }
}
