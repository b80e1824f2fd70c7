//! The card record and the rules for creating one.
//!
//! A card is either a text card or a file card. Clients still speak the
//! flat wire shape (`description` plus an optional `file`), so [`Card`]
//! serializes through a private record type that keeps that layout.

use crate::error::ValidationError;
use crate::CardId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upload limit carried over from the web form.
const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// An uploaded file attached to a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFile {
    /// Original file name.
    pub name: String,
    /// Size in bytes as reported by the uploader.
    pub size: u64,
    /// MIME type.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 data URL holding the file contents.
    pub data: String,
}

impl CardFile {
    /// Decoded length of `data`, worked out from its base64 text.
    ///
    /// Does not trust `size`; a data URL header before the comma is skipped.
    pub fn payload_bytes(&self) -> u64 {
        let encoded = self
            .data
            .split_once(',')
            .map_or(self.data.as_str(), |(_, payload)| payload)
            .trim_end_matches('=');
        encoded.len() as u64 * 3 / 4
    }
}

/// What a card carries besides its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardContent {
    /// Free text.
    Text { description: String },
    /// An uploaded file. The description is kept as a caption.
    File { description: String, file: CardFile },
}

impl CardContent {
    /// Text shown under the topic.
    pub fn description(&self) -> &str {
        match self {
            Self::Text { description } | Self::File { description, .. } => description,
        }
    }

    /// The attached file, for file cards.
    pub fn file(&self) -> Option<&CardFile> {
        match self {
            Self::Text { .. } => None,
            Self::File { file, .. } => Some(file),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }
}

/// A card as stored and broadcast by the server.
///
/// Every field is fixed at creation. There are no setters; a card can
/// only be removed from the store as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "CardRecord", from = "CardRecord")]
pub struct Card {
    id: CardId,
    topic: String,
    content: CardContent,
    created_at: DateTime<Utc>,
}

impl Card {
    /// Creates a card with a fresh id and the current time.
    pub fn new(topic: impl Into<String>, content: CardContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            content,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn content(&self) -> &CardContent {
        &self.content
    }

    pub fn description(&self) -> &str {
        self.content.description()
    }

    pub fn file(&self) -> Option<&CardFile> {
        self.content.file()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Flat wire layout of a card.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardRecord {
    id: CardId,
    topic: String,
    #[serde(default)]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<CardFile>,
    created_at: DateTime<Utc>,
}

impl From<Card> for CardRecord {
    fn from(card: Card) -> Self {
        let (description, file) = match card.content {
            CardContent::Text { description } => (description, None),
            CardContent::File { description, file } => (description, Some(file)),
        };
        Self {
            id: card.id,
            topic: card.topic,
            description,
            file,
            created_at: card.created_at,
        }
    }
}

impl From<CardRecord> for Card {
    fn from(record: CardRecord) -> Self {
        let content = match record.file {
            Some(file) => CardContent::File {
                description: record.description,
                file,
            },
            None => CardContent::Text {
                description: record.description,
            },
        };
        Self {
            id: record.id,
            topic: record.topic,
            content,
            created_at: record.created_at,
        }
    }
}

/// A client's `create_card` payload.
///
/// Any `id` or `createdAt` a client sends is ignored; the server
/// assigns both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<CardFile>,
}

impl CardRequest {
    /// A text card request.
    pub fn text(topic: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            description: description.into(),
            file: None,
        }
    }

    /// A file card request, captioned `File: <name>`.
    pub fn file(topic: impl Into<String>, file: CardFile) -> Self {
        Self {
            topic: topic.into(),
            description: format!("File: {}", file.name),
            file: Some(file),
        }
    }
}

/// Limits applied to create requests before a card is built.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Minimum topic length in characters, after trimming.
    pub min_topic_chars: usize,
    /// Largest accepted file, in bytes.
    pub max_file_bytes: u64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_topic_chars: 1,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl ValidationRules {
    /// Checks a request and builds the card it describes.
    ///
    /// Topic and description are trimmed. A request with a file always
    /// becomes a file card.
    pub fn validate(&self, request: CardRequest) -> Result<Card, ValidationError> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        if topic.chars().count() < self.min_topic_chars {
            return Err(ValidationError::TopicTooShort {
                min: self.min_topic_chars,
            });
        }

        let description = request.description.trim().to_string();
        let content = match request.file {
            Some(file) => {
                if file.name.trim().is_empty() {
                    return Err(ValidationError::EmptyFileName);
                }
                let size = file.size.max(file.payload_bytes());
                if size > self.max_file_bytes {
                    return Err(ValidationError::FileTooLarge {
                        size,
                        max: self.max_file_bytes,
                    });
                }
                CardContent::File { description, file }
            }
            None => CardContent::Text { description },
        };

        Ok(Card::new(topic, content))
    }
}
