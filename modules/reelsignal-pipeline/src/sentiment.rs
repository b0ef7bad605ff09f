//! Comment-polarity ensemble: two independent numeric heuristics over the
//! same text, averaged per comment, then meaned across the sample. Both
//! strategies sit behind one trait so each can be swapped or tested alone.

use serde::{Deserialize, Serialize};

use reelsignal_common::policy::{SENTIMENT_NEGATIVE_MAX, SENTIMENT_POSITIVE_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentReport {
    pub label: SentimentLabel,
    /// Mean polarity over the sample, in [-1, 1].
    pub score: f64,
    pub sample_size: usize,
}

impl SentimentReport {
    fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
            sample_size: 0,
        }
    }
}

pub trait SentimentStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// Polarity of one comment, in [-1, 1].
    fn score(&self, comment: &str) -> f64;
}

// --- Lexicon strategy ---

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "brilliant", "epic", "excited",
    "fantastic", "fire", "goosebumps", "great", "hyped", "incredible", "love",
    "loved", "masterpiece", "perfect", "stunning", "wow",
];

const NEGATIVE_WORDS: &[&str] = &[
    "awful", "bad", "boring", "cringe", "disappointed", "disappointing",
    "flop", "garbage", "hate", "lame", "mess", "pass", "skip", "terrible",
    "trash", "weak", "worst",
];

/// Word-list polarity: (positive hits - negative hits) over total hits.
pub struct LexiconStrategy;

impl SentimentStrategy for LexiconStrategy {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn score(&self, comment: &str) -> f64 {
        let mut positive = 0usize;
        let mut negative = 0usize;
        for token in comment
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            if POSITIVE_WORDS.contains(&token.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&token.as_str()) {
                negative += 1;
            }
        }
        let hits = positive + negative;
        if hits == 0 {
            return 0.0;
        }
        (positive as f64 - negative as f64) / hits as f64
    }
}

// --- Marker strategy ---

const POSITIVE_MARKERS: &[char] = &['🔥', '❤', '😍', '👏', '🎉', '💯'];
const NEGATIVE_MARKERS: &[char] = &['👎', '😴', '💀', '🙄'];

/// Emphasis heuristics: emoji markers, exclamation intensity, shouted words.
/// Deliberately orthogonal to the lexicon; it never looks at vocabulary.
pub struct MarkerStrategy;

impl SentimentStrategy for MarkerStrategy {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn score(&self, comment: &str) -> f64 {
        let mut score = 0.0;
        for c in comment.chars() {
            if POSITIVE_MARKERS.contains(&c) {
                score += 0.4;
            } else if NEGATIVE_MARKERS.contains(&c) {
                score -= 0.4;
            }
        }

        // Exclamation emphasis amplifies whatever emoji lean exists, and
        // counts weakly positive on its own (trailer comments shout praise).
        let bangs = comment.matches('!').count();
        if bangs > 0 {
            score += 0.1 * (bangs.min(3) as f64);
        }

        let shouted = comment
            .split_whitespace()
            .filter(|w| w.len() >= 4 && w.chars().all(|c| c.is_ascii_uppercase()))
            .count();
        if shouted > 0 && score < 0.0 {
            score -= 0.1;
        } else if shouted > 0 {
            score += 0.1;
        }

        score.clamp(-1.0, 1.0)
    }
}

// --- Ensemble ---

pub struct SentimentAnalyzer {
    strategies: Vec<Box<dyn SentimentStrategy>>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self {
            strategies: vec![Box::new(LexiconStrategy), Box::new(MarkerStrategy)],
        }
    }
}

impl SentimentAnalyzer {
    pub fn with_strategies(strategies: Vec<Box<dyn SentimentStrategy>>) -> Self {
        Self { strategies }
    }

    /// Average the strategies per comment, mean across comments, map to a
    /// label. Empty input is a neutral report, never an error.
    pub fn analyze<S: AsRef<str>>(&self, comments: &[S]) -> SentimentReport {
        if comments.is_empty() || self.strategies.is_empty() {
            return SentimentReport::neutral();
        }

        let total: f64 = comments
            .iter()
            .map(|comment| {
                let per_item: f64 = self
                    .strategies
                    .iter()
                    .map(|s| s.score(comment.as_ref()))
                    .sum::<f64>()
                    / self.strategies.len() as f64;
                per_item
            })
            .sum();
        let score = (total / comments.len() as f64).clamp(-1.0, 1.0);

        let label = if score > SENTIMENT_POSITIVE_MIN {
            SentimentLabel::Positive
        } else if score < SENTIMENT_NEGATIVE_MAX {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        SentimentReport {
            label,
            score,
            sample_size: comments.len(),
        }
    }
}
