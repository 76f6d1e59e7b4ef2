//! NATS subscriptions for incoming prediction and health requests

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to the request subjects the service answers on
pub struct RequestConsumer {
    client: Client,
    predict_subject: String,
    health_subject: String,
}

impl RequestConsumer {
    pub fn new(client: Client, predict_subject: &str, health_subject: &str) -> Self {
        Self {
            client,
            predict_subject: predict_subject.to_string(),
            health_subject: health_subject.to_string(),
        }
    }

    /// Subscribe to the prediction subject
    pub async fn subscribe_predictions(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.predict_subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.predict_subject))?;
        info!(subject = %self.predict_subject, "Subscribed to prediction subject");
        Ok(subscriber)
    }

    /// Subscribe to the health subject
    pub async fn subscribe_health(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.health_subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.health_subject))?;
        info!(subject = %self.health_subject, "Subscribed to health subject");
        Ok(subscriber)
    }

    pub fn predict_subject(&self) -> &str {
        &self.predict_subject
    }

    pub fn health_subject(&self) -> &str {
        &self.health_subject
    }
}
