//! Demo sources that generate realistic-looking feedback from templates.
//!
//! `{product}` in a template is replaced with the product name and
//! `{handle}` with the product name stripped of whitespace.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::SourceFetcher;
use crate::error::AnalysisError;
use crate::types::RawComment;

const FORUM_POSITIVE: &[&str] = &[
    "I've been using {product} for months and it's amazing!",
    "Best decision ever switching to {product}. Highly recommend!",
    "{product} has exceeded my expectations. Great product!",
    "Love {product}! Customer service is also fantastic.",
    "Can't imagine going back after trying {product}.",
];

const FORUM_NEGATIVE: &[&str] = &[
    "Really disappointed with {product}. Not worth the money.",
    "{product} has too many bugs. Switching to a competitor.",
    "Customer support for {product} is terrible. Never again.",
    "Expected more from {product}. Quality has gone downhill.",
    "Overpriced and underdelivering. {product} needs to improve.",
];

const FORUM_NEUTRAL: &[&str] = &[
    "{product} is okay, nothing special but gets the job done.",
    "Mixed feelings about {product}. Some good, some bad.",
    "It's average. {product} works but has room for improvement.",
    "Not sure if I'll continue with {product}. Still deciding.",
    "{product} meets basic needs but lacks innovation.",
];

const REVIEW_TEMPLATES: &[&str] = &[
    "{product} transformed our workflow. 5 stars!",
    "Good product but {product} needs better documentation.",
    "Pricing of {product} is too high for what it offers.",
    "Excellent features! {product} is our go-to solution.",
    "Integration issues with {product}. Support was helpful though.",
    "User interface of {product} could be more intuitive.",
    "Reliable and stable. {product} just works.",
    "Lots of features in {product} but steep learning curve.",
];

const SOCIAL_TEMPLATES: &[&str] = &[
    "Just tried {product} and I'm impressed!",
    "Why is {product} so expensive? Not happy",
    "@{handle} your product rocks!",
    "Thinking of canceling my {product} subscription...",
    "{product} update is fire! Great improvements",
    "Had issues with {product} today. Frustrating experience.",
    "Shoutout to {product} team for excellent support!",
    "{product} vs competitors? Not seeing the value tbh",
];

/// Which flavor of demo feedback a [`SyntheticSource`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceProfile {
    /// Discussion-forum posts, skewed 60/25/15 positive/negative/neutral.
    Forum,
    /// Review-aggregator entries.
    Reviews,
    /// Short-form social posts.
    Social,
}

impl SourceProfile {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SourceProfile::Forum => "forum",
            SourceProfile::Reviews => "reviews",
            SourceProfile::Social => "social",
        }
    }

    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            SourceProfile::Forum => 40,
            SourceProfile::Reviews | SourceProfile::Social => 30,
        }
    }

    /// Most comments one call will return, whatever the requested limit.
    #[must_use]
    pub fn per_call_cap(self) -> usize {
        match self {
            SourceProfile::Forum => 20,
            SourceProfile::Reviews | SourceProfile::Social => 15,
        }
    }
}

pub struct SyntheticSource {
    profile: SourceProfile,
    rng: Mutex<StdRng>,
}

impl SyntheticSource {
    #[must_use]
    pub fn new(profile: SourceProfile) -> Self {
        Self::with_rng(profile, StdRng::from_os_rng())
    }

    /// Deterministic output for a given seed.
    #[must_use]
    pub fn seeded(profile: SourceProfile, seed: u64) -> Self {
        Self::with_rng(profile, StdRng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn with_rng(profile: SourceProfile, rng: StdRng) -> Self {
        Self {
            profile,
            rng: Mutex::new(rng),
        }
    }

    fn generate(&self, product_name: &str, limit: usize) -> Result<Vec<RawComment>, AnalysisError> {
        let mut rng = self.rng.lock().map_err(|_| AnalysisError::Source {
            source_name: self.profile.name().to_string(),
            message: "random generator lock poisoned".to_string(),
        })?;

        let handle: String = product_name.split_whitespace().collect();
        let slug = product_name.to_lowercase().replace(' ', "-");
        let now = Utc::now();
        let count = limit.min(self.profile.per_call_cap());
        let mut comments = Vec::with_capacity(count);

        for _ in 0..count {
            let template = pick_template(self.profile, &mut *rng);
            let text = template
                .replace("{product}", product_name)
                .replace("{handle}", &handle);

            let (author, source_url) = match self.profile {
                SourceProfile::Forum => (
                    format!("user_{}", rng.random_range(1000..10_000)),
                    format!(
                        "https://forum.example.com/r/reviews/comments/{}",
                        rng.random_range(100_000..1_000_000)
                    ),
                ),
                SourceProfile::Reviews => (
                    format!("reviewer_{}", rng.random_range(100..1000)),
                    format!("https://reviews.example.com/review/{slug}"),
                ),
                SourceProfile::Social => (
                    format!("@user{}", rng.random_range(100..1000)),
                    format!(
                        "https://social.example.com/status/{}",
                        rng.random_range(1_000_000..10_000_000)
                    ),
                ),
            };

            comments.push(RawComment {
                text,
                source: self.profile.name().to_string(),
                source_url: Some(source_url),
                author: Some(author),
                posted_at: Some(now - Duration::minutes(rng.random_range(0..7 * 24 * 60))),
            });
        }

        Ok(comments)
    }
}

fn pick_template(profile: SourceProfile, rng: &mut StdRng) -> &'static str {
    let pool = match profile {
        SourceProfile::Forum => {
            let roll: f64 = rng.random();
            if roll < 0.60 {
                FORUM_POSITIVE
            } else if roll < 0.85 {
                FORUM_NEGATIVE
            } else {
                FORUM_NEUTRAL
            }
        }
        SourceProfile::Reviews => REVIEW_TEMPLATES,
        SourceProfile::Social => SOCIAL_TEMPLATES,
    };
    pool.choose(rng).copied().unwrap_or("{product}")
}

#[async_trait]
impl SourceFetcher for SyntheticSource {
    fn name(&self) -> &str {
        self.profile.name()
    }

    fn weight(&self) -> u32 {
        self.profile.weight()
    }

    fn is_synthetic(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        product_name: &str,
        limit: usize,
    ) -> Result<Vec<RawComment>, AnalysisError> {
        let comments = self.generate(product_name, limit)?;
        tracing::debug!(
            source = self.profile.name(),
            product = product_name,
            count = comments.len(),
            "generated synthetic comments"
        );
        Ok(comments)
    }
}
