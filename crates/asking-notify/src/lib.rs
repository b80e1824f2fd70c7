//! Asking Notify - side notifications for new cards
//!
//! The sync server hands every freshly created card to a [`Notifier`].
//! Delivery is best-effort: a notifier reports failure through its
//! `Result`, and the caller logs it and moves on.
//!
//! Two implementations ship here:
//! - [`WebhookNotifier`] posts an embed to a Discord-style webhook
//! - [`NoopNotifier`] does nothing, used when notifications are off

use asking_core::Card;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

mod format;
mod webhook;

pub use format::{human_size, truncate_description, DESCRIPTION_LIMIT};
pub use webhook::{Embed, EmbedField, EmbedFooter, WebhookConfig, WebhookNotifier, WebhookPayload};

/// Errors from a notification attempt.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook answered with status {0}")]
    Status(u16),
}

/// Something that can announce a new card.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a summary of `card`.
    async fn notify(&self, card: &Card) -> Result<(), NotifyError>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}

/// A notifier that drops every card.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _card: &Card) -> Result<(), NotifyError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Notification settings as read from the environment or CLI.
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// Master switch.
    pub enabled: bool,
    /// Webhook endpoint.
    pub webhook_url: Option<String>,
    /// Upper bound for a single delivery.
    pub timeout: Duration,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Picks the notifier the settings ask for.
///
/// Anything short of "enabled with a usable URL" falls back to
/// [`NoopNotifier`].
pub fn build_notifier(settings: &NotifierSettings) -> Arc<dyn Notifier> {
    let url = match (&settings.webhook_url, settings.enabled) {
        (Some(url), true) if !url.trim().is_empty() => url.clone(),
        _ => {
            info!("Notifications disabled or webhook URL not configured");
            return Arc::new(NoopNotifier);
        }
    };

    let config = WebhookConfig {
        url,
        timeout: settings.timeout,
        ..WebhookConfig::default()
    };

    match WebhookNotifier::new(config) {
        Ok(notifier) => {
            info!("Webhook notifications enabled");
            Arc::new(notifier)
        }
        Err(e) => {
            warn!("Could not build webhook client, notifications off: {}", e);
            Arc::new(NoopNotifier)
        }
    }
}
