//! Batch sentiment classification.

mod http;
mod lexicon;

pub use http::HttpClassifier;
pub use lexicon::{lexicon_score, LexiconClassifier};

use async_trait::async_trait;

use crate::types::SentimentResult;

/// Texts longer than this many characters are cut before classification.
pub const MAX_TEXT_CHARS: usize = 512;

/// Maps texts to sentiment, one result per input in input order.
///
/// Implementations never fail the caller: blank text yields
/// [`SentimentResult::neutral`] without touching the model, and any backend
/// failure degrades the affected items to neutral.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify_batch(&self, texts: &[String]) -> Vec<SentimentResult>;
}

/// Non-blank inputs with their original positions, truncated to
/// [`MAX_TEXT_CHARS`].
pub(crate) fn prepare_inputs(texts: &[String]) -> Vec<(usize, String)> {
    texts
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.trim().is_empty())
        .map(|(i, t)| (i, t.chars().take(MAX_TEXT_CHARS).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_skips_blank_and_truncates() {
        let long = "a".repeat(MAX_TEXT_CHARS + 100);
        let texts = vec![String::new(), "  \n".to_string(), long, "ok".to_string()];
        let prepared = prepare_inputs(&texts);

        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].0, 2);
        assert_eq!(prepared[0].1.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(prepared[1], (3, "ok".to_string()));
    }
}
