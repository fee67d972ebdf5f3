//! Lexicon-based sentiment classification.
//!
//! Two independent scorers vote: a pattern scorer (mean adjective polarity)
//! and a valence scorer (summed rule-adjusted valence, normalized to [-1, 1]).
//! Their average is bucketed into Positive / Negative / Neutral.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::SentimentConfig;

const BUNDLED_POLARITY: &str = include_str!("../../resources/lexicon/polarity.tsv");
const BUNDLED_VALENCE: &str = include_str!("../../resources/lexicon/valence.tsv");

/// Average score at or above which text is Positive (and at or below the
/// negation of which it is Negative).
pub const SENTIMENT_THRESHOLD: f64 = 0.05;

pub const SENTIMENT_ERROR_TEXT: &str = "Error in sentiment analysis";

/// Pattern scorer: polarity multiplier applied after a negation.
const PATTERN_NEGATION: f64 = -0.5;

/// Valence scorer constants.
const VALENCE_BOOST: f64 = 0.293;
const VALENCE_NEGATION: f64 = -0.74;
const EXCLAMATION_BOOST: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const NORMALIZATION_ALPHA: f64 = 15.0;
/// Weight of sentiment before / after a contrastive "but".
const BEFORE_BUT: f64 = 0.5;
const AFTER_BUT: f64 = 1.5;

static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").unwrap());

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("Sentiment lexicon could not be loaded: {0}")]
    LexiconLoad(String),

    #[error("Sentiment scoring failed: {0}")]
    Scoring(String),
}

/// Classification returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    /// Scoring failed at runtime.
    Error,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
            Self::Error => SENTIMENT_ERROR_TEXT,
        }
    }

    /// Bucket an averaged polarity score.
    pub fn from_score(score: f64) -> Self {
        if score >= SENTIMENT_THRESHOLD {
            Self::Positive
        } else if score <= -SENTIMENT_THRESHOLD {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SentimentLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A polarity scorer producing a value in [-1, 1].
pub trait PolarityScorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn polarity(&self, text: &str) -> Result<f64, SentimentError>;
}

/// Word → score table parsed from `word<TAB>score` lines. `#` starts a comment.
#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: HashMap<String, f64>,
}

impl Lexicon {
    pub fn parse(source: &str) -> Result<Self, SentimentError> {
        let mut entries = HashMap::new();
        for (line_no, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let (Some(word), Some(score)) = (fields.next(), fields.next()) else {
                tracing::warn!(line = line_no + 1, "Skipping lexicon line without a score");
                continue;
            };
            match score.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    entries.insert(word.trim().to_lowercase(), value);
                }
                _ => tracing::warn!(line = line_no + 1, "Skipping lexicon line with invalid score"),
            }
        }

        if entries.is_empty() {
            return Err(SentimentError::LexiconLoad("lexicon has no entries".into()));
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, SentimentError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| SentimentError::LexiconLoad(format!("{}: {e}", path.display())))?;
        Self::parse(&source)
    }

    pub fn get(&self, word: &str) -> Option<f64> {
        self.entries.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercased word tokens; curly apostrophes are folded to ASCII.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn is_negation(token: &str) -> bool {
    matches!(
        token,
        "not" | "no" | "never" | "none" | "nothing" | "neither" | "nor" | "cannot" | "without"
    ) || token.ends_with("n't")
}

/// Multiplier applied by the pattern scorer to the word that follows.
fn intensifier(token: &str) -> Option<f64> {
    match token {
        "extremely" | "incredibly" | "absolutely" => Some(1.5),
        "very" | "really" | "highly" | "truly" => Some(1.3),
        "so" | "too" => Some(1.2),
        "quite" => Some(1.1),
        "somewhat" | "fairly" => Some(0.7),
        "slightly" | "barely" => Some(0.5),
        _ => None,
    }
}

/// Additive boost applied by the valence scorer, signed towards intensity.
fn booster(token: &str) -> Option<f64> {
    match token {
        "very" | "really" | "extremely" | "incredibly" | "absolutely" | "so" | "totally"
        | "highly" | "truly" | "especially" => Some(VALENCE_BOOST),
        "slightly" | "somewhat" | "barely" | "kinda" | "marginally" | "hardly" => {
            Some(-VALENCE_BOOST)
        }
        _ => None,
    }
}

/// Mean polarity of opinion words, with intensifiers and negation.
pub struct PatternScorer {
    lexicon: Lexicon,
}

impl PatternScorer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn bundled() -> Result<Self, SentimentError> {
        Ok(Self::new(Lexicon::parse(BUNDLED_POLARITY)?))
    }
}

impl PolarityScorer for PatternScorer {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn polarity(&self, text: &str) -> Result<f64, SentimentError> {
        let tokens = tokenize(text);
        let mut assessments = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let Some(base) = self.lexicon.get(token) else {
                continue;
            };
            let mut score = base;
            if let Some(factor) = i.checked_sub(1).and_then(|p| intensifier(&tokens[p])) {
                score = (score * factor).clamp(-1.0, 1.0);
            }
            if tokens[i.saturating_sub(2)..i].iter().any(|t| is_negation(t)) {
                score *= PATTERN_NEGATION;
            }
            assessments.push(score);
        }

        if assessments.is_empty() {
            return Ok(0.0);
        }
        let mean = assessments.iter().sum::<f64>() / assessments.len() as f64;
        finite(mean, self.name())
    }
}

/// Rule-adjusted valence sum normalized with `x / sqrt(x² + 15)`.
pub struct ValenceScorer {
    lexicon: Lexicon,
}

impl ValenceScorer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn bundled() -> Result<Self, SentimentError> {
        Ok(Self::new(Lexicon::parse(BUNDLED_VALENCE)?))
    }

    pub fn from_path(path: &Path) -> Result<Self, SentimentError> {
        Ok(Self::new(Lexicon::load(path)?))
    }
}

/// Map an unbounded valence sum into [-1, 1].
pub fn normalize_valence(sum: f64) -> f64 {
    (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

impl PolarityScorer for ValenceScorer {
    fn name(&self) -> &'static str {
        "valence"
    }

    fn polarity(&self, text: &str) -> Result<f64, SentimentError> {
        let tokens = tokenize(text);
        let but_index = tokens.iter().position(|t| t == "but");
        let mut sum = 0.0;

        for (i, token) in tokens.iter().enumerate() {
            let Some(mut valence) = self.lexicon.get(token) else {
                continue;
            };

            // Boosters decay with distance: 1.0, 0.95, 0.9.
            for (distance, previous) in tokens[..i].iter().rev().take(3).enumerate() {
                if let Some(boost) = booster(previous) {
                    let signed = if valence < 0.0 { -boost } else { boost };
                    valence += signed * (1.0 - 0.05 * distance as f64);
                }
            }
            if tokens[i.saturating_sub(3)..i].iter().any(|t| is_negation(t)) {
                valence *= VALENCE_NEGATION;
            }
            if let Some(but) = but_index {
                if i < but {
                    valence *= BEFORE_BUT;
                } else if i > but {
                    valence *= AFTER_BUT;
                }
            }
            sum += valence;
        }

        let emphasis = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64 * EXCLAMATION_BOOST;
        if sum > 0.0 {
            sum += emphasis;
        } else if sum < 0.0 {
            sum -= emphasis;
        }

        finite(normalize_valence(sum), self.name())
    }
}

fn finite(score: f64, scorer: &str) -> Result<f64, SentimentError> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(SentimentError::Scoring(format!("{scorer} scorer produced {score}")))
    }
}

/// Averages the primary scorer with the secondary one when it initialized.
#[derive(Clone)]
pub struct SentimentAnalyzer {
    primary: Arc<dyn PolarityScorer>,
    secondary: Option<Arc<dyn PolarityScorer>>,
}

impl SentimentAnalyzer {
    pub fn new(primary: Arc<dyn PolarityScorer>, secondary: Option<Arc<dyn PolarityScorer>>) -> Self {
        Self { primary, secondary }
    }

    /// Bundled pattern scorer plus the valence scorer (bundled lexicon or the
    /// configured override). A valence lexicon that fails to load degrades to
    /// the pattern scorer alone.
    pub fn initialize(config: &SentimentConfig) -> Result<Self, SentimentError> {
        let primary: Arc<dyn PolarityScorer> = Arc::new(PatternScorer::bundled()?);

        let valence = match &config.valence_lexicon {
            Some(path) => ValenceScorer::from_path(path),
            None => ValenceScorer::bundled(),
        };
        let secondary: Option<Arc<dyn PolarityScorer>> = match valence {
            Ok(scorer) => {
                tracing::info!("Valence sentiment scorer initialized");
                Some(Arc::new(scorer))
            }
            Err(e) => {
                tracing::error!(error = %e, "Valence scorer unavailable, using pattern scorer only");
                None
            }
        };

        Ok(Self::new(primary, secondary))
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn analyze(&self, text: &str) -> SentimentLabel {
        if text.trim().is_empty() {
            tracing::warn!("Attempted to analyze sentiment of empty text");
            return SentimentLabel::Neutral;
        }

        match self.score(text) {
            Ok(score) => {
                let label = SentimentLabel::from_score(score);
                tracing::info!(score, label = label.as_str(), "Sentiment scored");
                label
            }
            Err(e) => {
                tracing::error!(error = %e, "Error during sentiment analysis");
                SentimentLabel::Error
            }
        }
    }

    fn score(&self, text: &str) -> Result<f64, SentimentError> {
        let primary = self.primary.polarity(text)?;
        match &self.secondary {
            Some(secondary) => {
                let other = secondary.polarity(text)?;
                tracing::debug!(
                    primary = self.primary.name(),
                    primary_score = primary,
                    secondary = secondary.name(),
                    secondary_score = other,
                    "Sentiment components"
                );
                Ok((primary + other) / 2.0)
            }
            None => Ok(primary),
        }
    }
}
