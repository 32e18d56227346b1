//! Configuration builders controlling tokenization, generation, and clustering.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeaveError};

/// Character sets driving the tokenizer.
///
/// Every set except [`Lexicon::literals`] holds single codepoints. Lexicons deserialize with
/// defaults for missing fields, so a JSON file only needs to list the sets it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Lexicon {
    /// Sentence marks stripped from the front of a raw word (`¡`, `¿`).
    pub left_stops: Vec<String>,
    /// Sentence marks stripped from the back of a raw word (`.`, `!`, `?`).
    pub right_stops: Vec<String>,
    /// Delimiters stripped from the front of a raw word (`(`, `«`).
    pub left_delims: Vec<String>,
    /// Delimiters stripped from the back of a raw word (`)`, `,`, `;`).
    pub right_delims: Vec<String>,
    /// Separators allowed between digit groups (`3.5`, `1,000`).
    pub numeric_separators: Vec<String>,
    /// Separators allowed inside words (`don't`, `well-known`).
    pub word_separators: Vec<String>,
    /// Whole words kept verbatim even though they contain stop characters (`etc.`).
    pub literals: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            left_stops: strings(&["¡", "¿"]),
            right_stops: strings(&[".", "!", "?", "…"]),
            left_delims: strings(&["(", "[", "{", "«", "“", "\""]),
            right_delims: strings(&[")", "]", "}", "»", "”", "\"", ",", ";", ":"]),
            numeric_separators: strings(&[".", ",", "'"]),
            word_separators: strings(&["'", "’", "-"]),
            literals: strings(&["Mr.", "Mrs.", "Ms.", "Dr.", "etc.", "e.g.", "i.e."]),
        }
    }
}

impl Lexicon {
    /// Returns a builder initialised with [`Lexicon::default`].
    #[must_use]
    pub fn builder() -> LexiconBuilder {
        LexiconBuilder::default()
    }

    /// Loads a lexicon from a JSON file and validates it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data =
            fs::read_to_string(path).map_err(|err| WeaveError::io(err, Some(path.to_path_buf())))?;
        let lexicon: Lexicon = serde_json::from_str(&data)?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    /// Validates that every character set holds single codepoints and literals are non-empty.
    pub fn validate(&self) -> Result<()> {
        let sets = [
            ("left_stops", &self.left_stops),
            ("right_stops", &self.right_stops),
            ("left_delims", &self.left_delims),
            ("right_delims", &self.right_delims),
            ("numeric_separators", &self.numeric_separators),
            ("word_separators", &self.word_separators),
        ];
        for (name, set) in sets {
            if let Some(bad) = set.iter().find(|entry| entry.chars().count() != 1) {
                return Err(WeaveError::InvalidConfig(format!(
                    "{name} entries must be single characters, found {bad:?}"
                )));
            }
        }
        if self.literals.iter().any(String::is_empty) {
            return Err(WeaveError::InvalidConfig(
                "literals must not contain empty strings".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn is_left_stop(&self, cp: &str) -> bool {
        contains(&self.left_stops, cp)
    }

    pub(crate) fn is_right_stop(&self, cp: &str) -> bool {
        contains(&self.right_stops, cp)
    }

    pub(crate) fn is_left_delim(&self, cp: &str) -> bool {
        contains(&self.left_delims, cp)
    }

    pub(crate) fn is_right_delim(&self, cp: &str) -> bool {
        contains(&self.right_delims, cp)
    }

    pub(crate) fn is_numeric_separator(&self, cp: &str) -> bool {
        contains(&self.numeric_separators, cp)
    }

    pub(crate) fn is_word_separator(&self, cp: &str) -> bool {
        contains(&self.word_separators, cp)
    }
}

fn contains(set: &[String], cp: &str) -> bool {
    set.iter().any(|entry| entry == cp)
}

/// Builder for [`Lexicon`].
#[derive(Debug, Default, Clone)]
pub struct LexiconBuilder {
    cfg: Lexicon,
}

impl LexiconBuilder {
    /// Creates a builder with [`Lexicon::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the literal words kept verbatim.
    #[must_use]
    pub fn literals<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.literals = literals.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the word separators.
    #[must_use]
    pub fn word_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.word_separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the numeric separators.
    #[must_use]
    pub fn numeric_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.numeric_separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Finalises the builder, returning a validated [`Lexicon`].
    pub fn build(self) -> Result<Lexicon> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// How the generator picks the next word.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Sampling {
    /// Frequency-proportional random choice.
    #[default]
    Weighted,
    /// Always the most frequent successor.
    Greedy,
}

/// Configuration of a [`crate::WordModel`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Seed for the sampling engine; `None` seeds from system entropy.
    pub seed: Option<u64>,
    /// Successor selection strategy.
    pub sampling: Sampling,
    /// Hard cap on the number of nodes visited by one generated line.
    pub max_walk_steps: Option<usize>,
    /// Floor used by path probability composition; must lie in `[0, 1)`.
    pub path_floor: f64,
    /// Enables progress logging through the `log` facade.
    pub show_progress: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: None,
            sampling: Sampling::Weighted,
            max_walk_steps: Some(1024),
            path_floor: 0.1,
            show_progress: false,
        }
    }
}

impl ModelConfig {
    /// Returns a builder initialised with [`ModelConfig::default`].
    #[must_use]
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Validates the invariants required by the model.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.path_floor) {
            return Err(WeaveError::InvalidConfig(format!(
                "path_floor ({}) must lie in [0, 1)",
                self.path_floor
            )));
        }
        if self.max_walk_steps == Some(0) {
            return Err(WeaveError::InvalidConfig(
                "max_walk_steps must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ModelConfig`].
#[derive(Debug, Default, Clone)]
pub struct ModelBuilder {
    cfg: ModelConfig,
}

impl ModelBuilder {
    /// Creates a builder with [`ModelConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the sampling seed.
    #[must_use]
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.cfg.seed = seed;
        self
    }

    /// Sets the successor selection strategy.
    #[must_use]
    pub fn sampling(mut self, sampling: Sampling) -> Self {
        self.cfg.sampling = sampling;
        self
    }

    /// Sets the walk length cap; `None` removes it.
    #[must_use]
    pub fn max_walk_steps(mut self, steps: Option<usize>) -> Self {
        self.cfg.max_walk_steps = steps;
        self
    }

    /// Sets the path probability floor.
    #[must_use]
    pub fn path_floor(mut self, floor: f64) -> Self {
        self.cfg.path_floor = floor;
        self
    }

    /// Enables or disables progress logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`ModelConfig`].
    pub fn build(self) -> Result<ModelConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration of a clustering run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Logs one line per merge through the `log` facade.
    pub show_progress: bool,
    /// Treats the START and END sentinels as vocabulary words.
    pub include_sentinels: bool,
    /// Maximum number of cached pair similarities; the cache is flushed when exceeded.
    pub cache_capacity: Option<usize>,
}

impl ClusterConfig {
    /// Returns a builder initialised with [`ClusterConfig::default`].
    #[must_use]
    pub fn builder() -> ClusterBuilder {
        ClusterBuilder::default()
    }

    /// Validates the clustering settings.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == Some(0) {
            return Err(WeaveError::InvalidConfig(
                "cache_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ClusterConfig`].
#[derive(Debug, Default, Clone)]
pub struct ClusterBuilder {
    cfg: ClusterConfig,
}

impl ClusterBuilder {
    /// Creates a builder with [`ClusterConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables per-merge logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Includes the START/END sentinels in the clustered vocabulary.
    #[must_use]
    pub fn include_sentinels(mut self, enabled: bool) -> Self {
        self.cfg.include_sentinels = enabled;
        self
    }

    /// Bounds the similarity cache.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.cfg.cache_capacity = capacity;
        self
    }

    /// Finalises the builder, returning a validated [`ClusterConfig`].
    pub fn build(self) -> Result<ClusterConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Controls how text corpora are discovered on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
        }
    }
}

impl IngestConfig {
    /// Returns a builder initialised with [`IngestConfig::default`].
    #[must_use]
    pub fn builder() -> IngestBuilder {
        IngestBuilder::default()
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default, Clone)]
pub struct IngestBuilder {
    cfg: IngestConfig,
}

impl IngestBuilder {
    /// Creates a new builder with [`IngestConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables recursive directory traversal.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks when traversing directories.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Finalises the builder, returning the [`IngestConfig`].
    pub fn build(self) -> IngestConfig {
        self.cfg
    }
}
