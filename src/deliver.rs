//! Digest delivery against the chat-channel contract.
//!
//! The concrete chat transport lives outside this crate; it implements
//! [`DeliveryChannel`] (send a MarkdownV2 message, edit one in place).
//! This module owns what the transport does not: the subscriber registry,
//! the freshness gate, and the ordered, progressively-revealed sending of
//! each topic's chunk group.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::SummaryDigest;
use crate::store::{load_json, save_json};
use crate::utils::{format_timestamp, parse_timestamp};

/// `last_sent` sentinel for fresh subscriptions; older than any digest.
pub const SUBSCRIPTION_EPOCH: &str = "1900-01-01 00:00:00";

/// Opaque reference to a sent message, used for edit-in-place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle(pub String);

/// The chat transport contract. Implementations must render MarkdownV2 and
/// support editing a previously sent message.
pub trait DeliveryChannel {
    async fn send(&mut self, chat_id: &str, text: &str) -> Result<MessageHandle>;
    async fn edit(&mut self, message: &MessageHandle, text: &str) -> Result<()>;
}

/// Why a delivery produced no messages, if it didn't. A distinct outcome
/// instead of silence or an error, so the bot layer can tell the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The digest holds no summaries at all.
    NothingToSend,
    /// The subscriber already received a digest at least this fresh.
    NothingNew,
}

/// Send every topic of `digest` to one chat.
///
/// With `by_chunks`, each topic starts as a message holding the header
/// fragment, then grows by editing the accumulated text back in after each
/// remaining fragment; otherwise the whole group is sent as one message.
/// Topic order and fragment order are both preserved.
#[instrument(level = "info", skip_all, fields(%chat_id, by_chunks))]
pub async fn send_digest<C: DeliveryChannel>(
    channel: &mut C,
    chat_id: &str,
    digest: &SummaryDigest,
    last_sent: &str,
    by_chunks: bool,
) -> Result<DeliveryOutcome> {
    if digest.summaries.is_empty() {
        warn!(chat_id, "digest holds no summaries to send");
        return Ok(DeliveryOutcome::NothingToSend);
    }
    let last_sent_at = parse_timestamp(last_sent)?;
    let last_updated = parse_timestamp(&digest.last_updated)?;
    if last_sent_at > last_updated {
        warn!(
            chat_id,
            last_sent,
            last_updated = %digest.last_updated,
            "no digest newer than the subscriber's last delivery"
        );
        return Ok(DeliveryOutcome::NothingNew);
    }

    for chunks in &digest.summaries {
        if by_chunks {
            let Some((first, rest)) = chunks.split_first() else {
                continue;
            };
            let mut text = first.clone();
            let handle = channel.send(chat_id, &text).await?;
            for chunk in rest {
                text.push_str(chunk);
                channel.edit(&handle, &text).await?;
            }
        } else {
            channel.send(chat_id, &chunks.concat()).await?;
        }
    }
    info!(chat_id, topics = digest.summaries.len(), "digest delivered");
    Ok(DeliveryOutcome::Delivered)
}

/// Deliver the digest to every registered subscriber, advancing each
/// subscriber's last-delivered timestamp only when they actually received it.
#[instrument(level = "info", skip_all)]
pub async fn deliver_to_all<C: DeliveryChannel>(
    channel: &mut C,
    registry: &SubscriberRegistry,
    digest: &SummaryDigest,
) -> Result<()> {
    for (chat_id, last_sent) in registry.load().await? {
        let outcome = send_digest(channel, &chat_id, digest, &last_sent, false).await?;
        if outcome == DeliveryOutcome::Delivered {
            registry.mark_delivered(&chat_id).await?;
        }
    }
    Ok(())
}

/// Subscriber registry: a JSON map from chat id to last-delivered timestamp,
/// read and rewritten wholesale on every operation. Single-process
/// assumption; there is no cross-writer coordination.
pub struct SubscriberRegistry {
    path: PathBuf,
}

impl SubscriberRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// A missing registry file reads as an empty registry, so a fresh
    /// deployment can accept its first subscription.
    pub async fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        load_json(&self.path).await
    }

    pub async fn is_subscriber(&self, chat_id: &str) -> Result<bool> {
        Ok(self.load().await?.contains_key(chat_id))
    }

    pub async fn subscribe(&self, chat_id: &str) -> Result<()> {
        let mut subscribers = self.load().await?;
        subscribers.insert(chat_id.to_string(), SUBSCRIPTION_EPOCH.to_string());
        save_json(&subscribers, &self.path).await?;
        info!(chat_id, "subscribed");
        Ok(())
    }

    pub async fn unsubscribe(&self, chat_id: &str) -> Result<()> {
        let mut subscribers = self.load().await?;
        subscribers.remove(chat_id);
        save_json(&subscribers, &self.path).await?;
        info!(chat_id, "unsubscribed");
        Ok(())
    }

    /// Record a completed delivery at the current time.
    pub async fn mark_delivered(&self, chat_id: &str) -> Result<()> {
        let mut subscribers = self.load().await?;
        subscribers.insert(
            chat_id.to_string(),
            format_timestamp(Local::now().naive_local()),
        );
        save_json(&subscribers, &self.path).await?;
        Ok(())
    }
}
