//! Engine and tokenizer configuration.
//!
//! Runtime values come from CLI arguments in the binaries; the constants here
//! are the defaults they fall back to.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of documents returned by a search when the caller does not ask for a count.
pub const DEFAULT_K: usize = 4;

/// BM25 term frequency saturation parameter.
pub const BM25_K1: f64 = 1.5;

/// BM25 document length normalization parameter. 0.0 disables length
/// normalization, 1.0 applies it fully.
pub const BM25_B: f64 = 0.75;

/// Prefix of engine-generated document ids (`doc_1`, `doc_2`, ...).
pub const GENERATED_ID_PREFIX: &str = "doc_";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub default_k: usize,
    pub k1: f64,
    pub b: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { default_k: DEFAULT_K, k1: BM25_K1, b: BM25_B }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        validate_k(self.default_k)?;
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "k1 must be a finite non-negative number, got {}",
                self.k1
            )));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(EngineError::InvalidConfiguration(format!(
                "b must lie in [0, 1], got {}",
                self.b
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(EngineError::InvalidConfiguration("k must be a positive integer".into()));
    }
    Ok(())
}

/// Tokenizer settings. All normalizations are off by default so terms are the
/// raw segments of the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Supplementary vocabulary for CJK segmentation, in jieba dictionary format.
    pub user_dict: Option<PathBuf>,
    #[serde(default)]
    pub nfkc: bool,
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default)]
    pub stopwords: bool,
    #[serde(default)]
    pub stem: bool,
}

impl TokenizerConfig {
    pub fn with_user_dict<P: Into<PathBuf>>(path: P) -> Self {
        Self { user_dict: Some(path.into()), ..Self::default() }
    }

    pub(crate) fn normalizes(&self) -> bool {
        self.nfkc || self.lowercase || self.stopwords || self.stem
    }
}
