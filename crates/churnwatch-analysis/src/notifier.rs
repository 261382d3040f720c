//! Spike alert delivery.
//!
//! Delivery is best effort: implementations report success as a `bool` and
//! log failures instead of returning them.

use std::time::Duration;

use async_trait::async_trait;
use churnwatch_core::{Product, Subscriber};
use serde::Serialize;

use crate::error::AnalysisError;
use crate::types::{Spike, SpikeKind};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subscriber: &Subscriber, product: &Product, spike: &Spike) -> bool;
}

/// Human-readable subject line for an alert.
#[must_use]
pub fn alert_subject(product: &Product, spike: &Spike) -> String {
    let direction = match spike.kind {
        SpikeKind::NegativeSpike => "Negative",
        SpikeKind::PositiveSpike => "Positive",
    };
    format!(
        "{direction} sentiment spike for {}: {:+.1} points",
        product.name, spike.change_percentage
    )
}

/// Writes alerts to the tracing log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subscriber: &Subscriber, product: &Product, spike: &Spike) -> bool {
        tracing::info!(
            to = subscriber.email.as_str(),
            product = product.name.as_str(),
            kind = spike.kind.as_str(),
            change_percentage = spike.change_percentage,
            job_id = spike.job_id,
            "{}",
            alert_subject(product, spike)
        );
        true
    }
}

#[derive(Serialize)]
struct AlertPayload<'a> {
    to: &'a str,
    display_name: Option<&'a str>,
    subject: String,
    product: &'a str,
    dashboard_url: String,
    spike: &'a Spike,
}

/// POSTs each alert as JSON to a webhook (e.g. a mail relay).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    frontend_url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, frontend_url: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        })
    }

    fn dashboard_url(&self, product: &Product) -> String {
        format!("{}/dashboard/{}", self.frontend_url, product.name)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, subscriber: &Subscriber, product: &Product, spike: &Spike) -> bool {
        let payload = AlertPayload {
            to: &subscriber.email,
            display_name: subscriber.display_name.as_deref(),
            subject: alert_subject(product, spike),
            product: &product.name,
            dashboard_url: self.dashboard_url(product),
            spike,
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(
                    to = subscriber.email.as_str(),
                    status = %response.status(),
                    "alert webhook rejected notification"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    to = subscriber.email.as_str(),
                    error = %e,
                    "alert webhook request failed"
                );
                false
            }
        }
    }
}
