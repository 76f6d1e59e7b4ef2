//! NATS reply publisher

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::{debug, warn};

/// Publishes JSON replies to the inbox a requester is waiting on
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Serialize `body` and publish it to `reply`.
    ///
    /// Messages without a reply subject were fire-and-forget; the body is
    /// dropped with a warning.
    pub async fn reply<T: Serialize>(&self, reply: Option<Subject>, body: &T) -> Result<()> {
        let Some(subject) = reply else {
            warn!("Request has no reply subject, dropping response");
            return Ok(());
        };

        let payload = encode(body)?;
        let size = payload.len();

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(subject = %subject, bytes = size, "Published reply");

        Ok(())
    }
}

/// JSON body of a reply
pub fn encode<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}
