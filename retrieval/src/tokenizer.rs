use crate::config::TokenizerConfig;
use jieba_rs::Jieba;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// English function words dropped when stop-word filtering is on. Negations
/// are not in the list.
const ENGLISH_FUNCTION_WORDS: &[&str] = &[
    // articles and determiners
    "a", "an", "the", "this", "that", "these", "those", "each", "every", "some", "any",
    // conjunctions
    "and", "or", "but", "nor", "so", "yet", "if", "than", "then", "because", "while",
    // prepositions
    "of", "in", "on", "at", "to", "for", "from", "by", "with", "about", "as", "into", "onto",
    "over", "under", "upon", "via", "per", "through", "between", "among", "within", "without",
    // pronouns
    "i", "me", "my", "we", "us", "our", "you", "your", "he", "him", "his", "she", "her",
    "it", "its", "they", "them", "their", "who", "whom", "whose", "which", "what",
    // auxiliaries
    "am", "is", "are", "was", "were", "be", "been", "being", "do", "does", "did",
    "has", "have", "had", "will", "would", "shall", "should", "can", "could", "may", "might", "must",
];

lazy_static! {
    static ref CJK: Regex = Regex::new(r"[\x{4E00}-\x{9FFF}]").expect("valid regex");
    static ref BASELINE: Arc<Jieba> = Arc::new(Jieba::new());
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = ENGLISH_FUNCTION_WORDS.iter().copied().collect();
}

/// Writing system detected in a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Contains at least one CJK Unified Ideograph; needs dictionary segmentation.
    Logographic,
    SpaceDelimited,
}

impl Script {
    pub fn classify(text: &str) -> Script {
        if CJK.is_match(text) {
            Script::Logographic
        } else {
            Script::SpaceDelimited
        }
    }
}

/// A way of cutting text into raw terms, in left-to-right order.
pub trait TermStrategy: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceStrategy;

impl TermStrategy for WhitespaceStrategy {
    fn segment(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// Dictionary-based word segmentation backed by jieba.
#[derive(Clone)]
pub struct DictionaryStrategy {
    jieba: Arc<Jieba>,
}

impl DictionaryStrategy {
    /// Segmenter using only the built-in vocabulary. Shared by every caller.
    pub fn baseline() -> Self {
        Self { jieba: Arc::clone(&BASELINE) }
    }

    /// Baseline vocabulary extended with a user dictionary file. A missing or
    /// malformed file is logged and the baseline is used instead.
    pub fn with_user_dict(path: &Path) -> Self {
        match load_user_dict(path) {
            Ok(jieba) => {
                tracing::info!(path = %path.display(), "loaded user dictionary");
                Self { jieba: Arc::new(jieba) }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "user dictionary unavailable, using baseline vocabulary");
                Self::baseline()
            }
        }
    }
}

fn load_user_dict(path: &Path) -> anyhow::Result<Jieba> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut jieba = Jieba::new();
    jieba
        .load_dict(&mut reader)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(jieba)
}

impl TermStrategy for DictionaryStrategy {
    fn segment(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut(text, true)
            .into_iter()
            .filter(|w| !w.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Script-aware tokenizer. Cheap to clone; the dictionary is shared read-only.
#[derive(Clone)]
pub struct Tokenizer {
    dictionary: DictionaryStrategy,
    whitespace: WhitespaceStrategy,
    config: TokenizerConfig,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        let dictionary = match &config.user_dict {
            Some(path) => DictionaryStrategy::with_user_dict(path),
            None => DictionaryStrategy::baseline(),
        };
        Self { dictionary, whitespace: WhitespaceStrategy, config: config.clone() }
    }

    pub fn strategy_for(&self, script: Script) -> &dyn TermStrategy {
        match script {
            Script::Logographic => &self.dictionary,
            Script::SpaceDelimited => &self.whitespace,
        }
    }

    /// Tokenize text into ordered terms. Empty or blank input yields no terms.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let terms = self.strategy_for(Script::classify(text)).segment(text);
        if !self.config.normalizes() {
            return terms;
        }
        terms.into_iter().filter_map(|t| self.normalize(t)).collect()
    }

    fn normalize(&self, term: String) -> Option<String> {
        let mut term = if self.config.nfkc { term.nfkc().collect::<String>() } else { term };
        if self.config.lowercase {
            term = term.to_lowercase();
        }
        if self.config.stopwords && STOPWORDS.contains(term.as_str()) {
            return None;
        }
        if self.config.stem {
            term = STEMMER.stem(&term).into_owned();
        }
        if term.is_empty() {
            None
        } else {
            Some(term)
        }
    }
}
