//! Keyword-bucket topic extraction over a fixed taxonomy.
//!
//! Matching is a case-insensitive substring test. Every keyword that matches
//! a text counts as one mention of its topic, so one text can add several
//! mentions to the same topic and can land under several topics.

use std::collections::BTreeMap;

use churnwatch_core::NewTopic;

/// Keywords shown per topic. Counting always uses every match.
pub const DISPLAY_KEYWORDS: usize = 5;

/// Matched but never displayed.
const HIDDEN_KEYWORDS: &[&str] = &["$"];

const DEFAULT_TAXONOMY: &[(&str, &[&str])] = &[
    (
        "price",
        &["price", "expensive", "cheap", "cost", "pricing", "affordable", "$"],
    ),
    (
        "quality",
        &["quality", "reliable", "durable", "broken", "defective"],
    ),
    (
        "support",
        &["support", "service", "help", "customer service", "response"],
    ),
    (
        "features",
        &["feature", "functionality", "capability", "option", "tool"],
    ),
    (
        "performance",
        &["fast", "slow", "performance", "speed", "lag", "responsive"],
    ),
    (
        "usability",
        &["easy", "difficult", "intuitive", "user-friendly", "complicated"],
    ),
];

/// Running statistics for one topic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicStats {
    pub mention_count: u32,
    /// Matched keywords in first-match order, deduplicated.
    matched: Vec<String>,
    score_sum: f64,
}

impl TopicStats {
    fn record(&mut self, keyword: &str, score: f64) {
        self.mention_count += 1;
        self.score_sum += score;
        if !self.matched.iter().any(|k| k == keyword) {
            self.matched.push(keyword.to_string());
        }
    }

    /// Up to [`DISPLAY_KEYWORDS`] matched keywords, in first-match order.
    #[must_use]
    pub fn keywords(&self) -> Vec<String> {
        self.matched
            .iter()
            .filter(|k| !HIDDEN_KEYWORDS.contains(&k.as_str()))
            .take(DISPLAY_KEYWORDS)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn avg_sentiment(&self) -> f64 {
        if self.mention_count == 0 {
            0.0
        } else {
            self.score_sum / f64::from(self.mention_count)
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicExtractor {
    taxonomy: Vec<(String, Vec<String>)>,
}

impl Default for TopicExtractor {
    fn default() -> Self {
        Self {
            taxonomy: DEFAULT_TAXONOMY
                .iter()
                .map(|(name, keywords)| {
                    (
                        (*name).to_string(),
                        keywords.iter().map(|k| (*k).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl TopicExtractor {
    #[must_use]
    pub fn new(taxonomy: Vec<(String, Vec<String>)>) -> Self {
        Self { taxonomy }
    }

    /// Bucket `texts` into topics. `scores[i]` is the signed sentiment of
    /// `texts[i]`. Topics with no matches are absent from the result.
    #[must_use]
    pub fn extract(&self, texts: &[String], scores: &[f64]) -> BTreeMap<String, TopicStats> {
        let mut topics: BTreeMap<String, TopicStats> = BTreeMap::new();

        for (text, &score) in texts.iter().zip(scores) {
            let lowered = text.to_lowercase();
            for (name, keywords) in &self.taxonomy {
                for keyword in keywords {
                    if lowered.contains(keyword.as_str()) {
                        topics.entry(name.clone()).or_default().record(keyword, score);
                    }
                }
            }
        }

        topics
    }
}

/// Persistable topics, highest mention count first, ties by name.
#[must_use]
pub fn to_new_topics(topics: &BTreeMap<String, TopicStats>) -> Vec<NewTopic> {
    let mut rows: Vec<NewTopic> = topics
        .iter()
        .map(|(name, stats)| NewTopic {
            name: name.clone(),
            keywords: stats.keywords(),
            mention_count: i32::try_from(stats.mention_count).unwrap_or(i32::MAX),
            avg_sentiment: stats.avg_sentiment().clamp(-1.0, 1.0),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.mention_count
            .cmp(&a.mention_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}
