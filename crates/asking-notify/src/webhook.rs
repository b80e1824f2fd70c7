//! Discord-style webhook delivery.
//!
//! One POST per card, carrying a single embed with the topic, the
//! (truncated) description and the attachment summary if there is one.

use crate::format::{human_size, truncate_description};
use crate::{Notifier, NotifyError};
use asking_core::Card;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Webhook endpoint and presentation settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint to POST to.
    pub url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Display name of the posting bot.
    pub username: String,
    /// Embed title.
    pub title: String,
    /// Embed footer text.
    pub footer: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(10),
            username: "Asking Card".to_string(),
            title: "📝 New Asking Card Created!".to_string(),
            footer: Some("Asking Card".to_string()),
        }
    }
}

/// Body of a webhook request.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub username: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl EmbedField {
    fn block(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
            inline: false,
        }
    }
}

impl WebhookPayload {
    /// Builds the summary posted for `card`.
    pub fn for_card(card: &Card, config: &WebhookConfig) -> Self {
        let mut fields = vec![
            EmbedField::block("Topic", card.topic().to_string()),
            EmbedField::block("Description", truncate_description(card.description())),
        ];

        if let Some(file) = card.file() {
            fields.push(EmbedField::block(
                "📎 File Attachment",
                format!("**{}** ({})", file.name, human_size(file.size)),
            ));
        }

        let embed = Embed {
            title: config.title.clone(),
            color: 0x000000,
            fields,
            timestamp: card.created_at().to_rfc3339(),
            footer: config.footer.clone().map(|text| EmbedFooter { text }),
        };

        Self {
            username: config.username.clone(),
            embeds: vec![embed],
        }
    }
}

/// Posts card summaries to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    /// Creates a notifier whose HTTP client enforces `config.timeout`.
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, card: &Card) -> Result<(), NotifyError> {
        let payload = WebhookPayload::for_card(card, &self.config);

        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        debug!("Webhook accepted card {}", card.id());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
