//! Wire events exchanged over the WebSocket.
//!
//! Every frame is one JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`.

use asking_core::{Card, CardId, CardRequest, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A serialized server event, shared by every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Client-to-server messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Create a card from a form submission.
    CreateCard(CardRequest),
    /// Delete a card by id.
    DeleteCard(DeleteCardPayload),
}

/// Server-to-client messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full card list, sent once right after connecting.
    InitialCards(Vec<Card>),
    /// A card was created. Sent to everyone, creator included.
    NewCard(Card),
    /// A card was deleted.
    CardDeleted(CardDeletedPayload),
    /// The sender's create request failed validation.
    CardRejected(CardRejectedPayload),
    /// The sender's frame could not be understood.
    Error(ErrorPayload),
}

/// Target of a `delete_card` event.
///
/// Accepts `{"id": "..."}` as well as a bare id string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DeleteTarget")]
pub struct DeleteCardPayload {
    pub id: CardId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeleteTarget {
    Bare(CardId),
    Object { id: CardId },
}

impl From<DeleteTarget> for DeleteCardPayload {
    fn from(target: DeleteTarget) -> Self {
        match target {
            DeleteTarget::Bare(id) | DeleteTarget::Object { id } => Self { id },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDeletedPayload {
    pub id: CardId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRejectedPayload {
    /// Offending request field.
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl From<&ValidationError> for CardRejectedPayload {
    fn from(err: &ValidationError) -> Self {
        Self {
            field: err.field().to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ServerEvent {
    /// Serializes the event into a shareable frame.
    pub fn encode(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }

    /// Parses a frame back into an event.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitialCards(_) => "initial_cards",
            Self::NewCard(_) => "new_card",
            Self::CardDeleted(_) => "card_deleted",
            Self::CardRejected(_) => "card_rejected",
            Self::Error(_) => "error",
        }
    }
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
