//! Word-weight lexicon tuned for customer feedback about software products.

use async_trait::async_trait;
use churnwatch_core::SentimentLabel;

use super::{prepare_inputs, SentimentClassifier};
use crate::types::SentimentResult;

/// Scores with an absolute value below this are reported neutral.
const NEUTRAL_BAND: f64 = 0.05;

/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
const LEXICON: &[(&str, f64)] = &[
    // Positive signals
    ("amazing", 0.5),
    ("awesome", 0.5),
    ("best", 0.5),
    ("excellent", 0.5),
    ("exceeded", 0.4),
    ("fantastic", 0.5),
    ("fast", 0.3),
    ("good", 0.3),
    ("great", 0.4),
    ("helpful", 0.3),
    ("impressed", 0.4),
    ("improvements", 0.3),
    ("intuitive", 0.3),
    ("love", 0.5),
    ("recommend", 0.4),
    ("reliable", 0.4),
    ("rocks", 0.4),
    ("stable", 0.3),
    ("transformed", 0.4),
    ("works", 0.2),
    // Negative signals
    ("bad", -0.4),
    ("broken", -0.5),
    ("bugs", -0.4),
    ("buggy", -0.4),
    ("cancel", -0.5),
    ("canceling", -0.5),
    ("crash", -0.5),
    ("defective", -0.5),
    ("difficult", -0.3),
    ("disappointed", -0.5),
    ("downhill", -0.4),
    ("expensive", -0.4),
    ("frustrating", -0.5),
    ("issues", -0.3),
    ("overpriced", -0.5),
    ("refund", -0.4),
    ("slow", -0.3),
    ("terrible", -0.6),
    ("unhappy", -0.5),
    ("worst", -0.6),
];

/// Score a text string using the lexicon.
///
/// Splits text into lowercase words, sums matching weights, and clamps
/// the result to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f64 {
    let mut score = 0.0_f64;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex_word, _)| *lex_word == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

fn classify_one(text: &str) -> SentimentResult {
    let score = lexicon_score(text);
    if score >= NEUTRAL_BAND {
        SentimentResult::from_label(SentimentLabel::Positive, score)
    } else if score <= -NEUTRAL_BAND {
        SentimentResult::from_label(SentimentLabel::Negative, -score)
    } else {
        SentimentResult::neutral()
    }
}

/// In-process classifier backed by [`lexicon_score`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconClassifier;

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify_batch(&self, texts: &[String]) -> Vec<SentimentResult> {
        let mut results = vec![SentimentResult::neutral(); texts.len()];
        let inputs = prepare_inputs(texts);
        if inputs.is_empty() {
            return results;
        }

        // Scoring is CPU-bound; keep it off the async workers.
        let scored = tokio::task::spawn_blocking(move || {
            inputs
                .into_iter()
                .map(|(i, text)| (i, classify_one(&text)))
                .collect::<Vec<_>>()
        })
        .await;

        match scored {
            Ok(scored) => {
                for (i, result) in scored {
                    results[i] = result;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "lexicon scoring task failed; using neutral results");
            }
        }
        results
    }
}
