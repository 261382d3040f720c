//! Client for a remote sentiment model server.
//!
//! `POST {base_url}/predict` with `{"inputs": [...]}` must return one
//! `{"label", "score"}` object per input, in order.

use std::time::Duration;

use async_trait::async_trait;
use churnwatch_core::SentimentLabel;
use serde::{Deserialize, Serialize};

use super::{prepare_inputs, SentimentClassifier};
use crate::error::AnalysisError;
use crate::types::SentimentResult;

const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
    score: f64,
}

pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    batch_size: usize,
}

impl HttpClassifier {
    /// Build a classifier whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, batch_size))
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        Self {
            client,
            url: format!("{}/predict", base_url.trim_end_matches('/')),
            batch_size,
        }
    }

    async fn predict(&self, chunk: &[&str]) -> Result<Vec<SentimentResult>, AnalysisError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PredictRequest { inputs: chunk })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AnalysisError::Classifier(format!(
                "model server returned status {}",
                response.status()
            )));
        }

        let predictions: Vec<Prediction> = response
            .json()
            .await
            .map_err(|e| AnalysisError::Classifier(format!("response parse error: {e}")))?;

        if predictions.len() != chunk.len() {
            return Err(AnalysisError::Classifier(format!(
                "model server returned {} predictions for {} inputs",
                predictions.len(),
                chunk.len()
            )));
        }

        Ok(predictions
            .into_iter()
            .map(|p| SentimentResult::from_label(parse_label(&p.label), p.score))
            .collect())
    }
}

/// Map model labels onto the three sentiment classes. Unknown labels are
/// neutral.
fn parse_label(raw: &str) -> SentimentLabel {
    match raw.to_ascii_lowercase().as_str() {
        "positive" | "pos" | "label_1" => SentimentLabel::Positive,
        "negative" | "neg" | "label_0" => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    }
}

#[async_trait]
impl SentimentClassifier for HttpClassifier {
    async fn classify_batch(&self, texts: &[String]) -> Vec<SentimentResult> {
        let mut results = vec![SentimentResult::neutral(); texts.len()];
        let inputs = prepare_inputs(texts);

        for chunk in inputs.chunks(self.batch_size) {
            let batch: Vec<&str> = chunk.iter().map(|(_, t)| t.as_str()).collect();
            match self.predict(&batch).await {
                Ok(predicted) => {
                    for ((i, _), result) in chunk.iter().zip(predicted) {
                        results[*i] = result;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        batch_len = batch.len(),
                        error = %e,
                        "classifier batch failed; degrading to neutral"
                    );
                }
            }
        }

        results
    }
}
